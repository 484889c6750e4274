//! Error types for the Courier server binary.
//!
//! [`AppError`] wraps every failure mode during startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the Courier server binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: courier_core::ConfigError,
    },

    /// The tracking server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: courier_observer::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("task error: {source}")]
    Task {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
