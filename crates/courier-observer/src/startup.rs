//! Tracking server startup helper for the Courier binary.
//!
//! Provides [`spawn_observer`] which binds the listener eagerly and then
//! serves the HTTP + `WebSocket` API on a background Tokio task, so bind
//! failures surface to the caller instead of inside the task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use courier_observer::{AppState, ServerConfig, spawn_observer};
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(store, session));
//! let handle = spawn_observer(&ServerConfig::default(), state, shutdown).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the tracking server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the configured address and serve the tracking API on a background
/// Tokio task until `shutdown` completes.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_observer<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<()>, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Tracking server exited with error");
        }
    });

    tracing::info!(%addr, "Tracking server spawned on background task");

    Ok(handle)
}
