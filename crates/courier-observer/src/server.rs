//! Tracking HTTP server lifecycle management.
//!
//! Provides [`ServerConfig`] for the listen address and [`serve`], which
//! runs the Axum server on a bound listener until the given shutdown
//! future completes. [`spawn_observer`](crate::spawn_observer) binds and
//! calls it on a background task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use courier_core::HttpConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the tracking server listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl ServerConfig {
    /// Parse the configured host and port into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the pair is not a valid address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address {}:{}: {e}", self.host, self.port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for ServerConfig {
    fn from(http: &HttpConfig) -> Self {
        Self {
            host: http.host.clone(),
            port: http.port,
        }
    }
}

/// Serve the tracking API on an already bound listener until `shutdown`
/// completes.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no local address: {e}")))?;
    let router = build_router(state);

    info!(%addr, "Tracking server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!(%addr, "Tracking server stopped");
    Ok(())
}

/// Errors that can occur when starting or running the tracking server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
