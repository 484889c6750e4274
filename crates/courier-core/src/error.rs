//! Error types for the location store.

use crate::validation::ValidationError;

/// Admission failures when talking to the command loop.
///
/// None of these mean the store is broken: they tell the caller that this
/// one request was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The incoming-sample queue is full; the sample was not enqueued.
    #[error("ingest queue is full")]
    QueueFull,

    /// The command loop has stopped (shutdown or dropped).
    #[error("location store is closed")]
    Closed,

    /// The command loop did not accept the request within the control
    /// timeout.
    #[error("timed out waiting for the location store")]
    Timeout,
}

/// Failure to ingest a raw location report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    /// The report failed validation and never reached the store.
    #[error("invalid location report: {0}")]
    Invalid(#[from] ValidationError),

    /// The report was valid but could not be enqueued.
    #[error(transparent)]
    Store(#[from] StoreError),
}
