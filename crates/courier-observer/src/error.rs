//! Error types for the tracking API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"error": "...", "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier_core::{StoreError, ValidationError};

/// Errors that can occur in the tracking API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The location report failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body was not a JSON location report.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The location store is not accepting work.
    #[error("service unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

impl ObserverError {
    /// HTTP status code for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
