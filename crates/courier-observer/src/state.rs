//! Shared application state for the tracking API server.

use courier_core::{LocationStore, SessionConfig};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. The store handle is cheap to clone; every `WebSocket`
/// session takes its own copy.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the location store.
    pub store: LocationStore,
    /// Timing for `WebSocket` subscriber sessions.
    pub session: SessionConfig,
}

impl AppState {
    /// Create application state around a running store.
    pub const fn new(store: LocationStore, session: SessionConfig) -> Self {
        Self { store, session }
    }
}
