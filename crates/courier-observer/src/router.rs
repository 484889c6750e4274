//! Axum router construction for the tracking API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the tracking server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /api/health` -- health check
/// - `POST /api/tracking/update` -- location ingress
/// - `GET /api/tracking/locations` -- current locations
/// - `GET /api/tracking/locations/{entity_id}` -- one entity's location
/// - `GET /api/tracking/entities` -- tracked entities
/// - `GET /api/tracking/ws` -- `WebSocket` subscriber session
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        .route("/api/tracking/update", post(handlers::update_location))
        .route("/api/tracking/locations", get(handlers::list_locations))
        .route(
            "/api/tracking/locations/{entity_id}",
            get(handlers::get_location),
        )
        .route("/api/tracking/entities", get(handlers::list_entities))
        .route("/api/tracking/ws", get(ws::ws_tracking))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
