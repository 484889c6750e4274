//! REST API endpoint handlers for the tracking server.
//!
//! Handlers read through the [`LocationStore`] handle in [`AppState`].
//! The update handler only enqueues; it never waits for the command loop
//! to apply the sample.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/health` | Liveness plus entity/subscriber counts |
//! | `POST` | `/api/tracking/update` | Ingest one location report |
//! | `GET` | `/api/tracking/locations` | All non-stale locations |
//! | `GET` | `/api/tracking/locations/{entity_id}` | One entity's current location |
//! | `GET` | `/api/tracking/entities` | Every entity ever seen |
//!
//! [`LocationStore`]: courier_core::LocationStore

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use courier_core::{IngestError, StoreError};
use courier_types::LocationReport;
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entities = state.store.entity_count().await;
    let live = state.store.all_current_locations().await.len();
    let subscribers = state.store.subscriber_count();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Courier Tracking</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Courier Tracking</h1>
    <p>Status: <span class="status">RUNNING</span></p>

    <div>
        <div class="metric">
            <div class="label">Entities</div>
            <div class="value">{entities}</div>
        </div>
        <div class="metric">
            <div class="label">Live locations</div>
            <div class="value">{live}</div>
        </div>
        <div class="metric">
            <div class="label">Subscribers</div>
            <div class="value">{subscribers}</div>
        </div>
    </div>

    <h2>API</h2>
    <ul>
        <li>POST /api/tracking/update -- Submit a location report</li>
        <li>GET <a href="/api/tracking/locations">/api/tracking/locations</a> -- Current locations</li>
        <li>GET /api/tracking/locations/{{entity_id}} -- One entity's location</li>
        <li>GET <a href="/api/tracking/entities">/api/tracking/entities</a> -- Tracked entities</li>
        <li>GET <a href="/api/health">/api/health</a> -- Health check</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/api/tracking/ws</code> -- Live location stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Report liveness with entity and subscriber counts.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "entities": state.store.entity_count().await,
        "subscribers": state.store.subscriber_count(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/tracking/update
// ---------------------------------------------------------------------------

/// Validate a location report and hand it to the store.
///
/// A full ingest queue still answers 200: ingestion is fire-and-forget
/// and the drop is logged. A stopped store answers 503.
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LocationReport>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(report) = payload.map_err(|e| ObserverError::InvalidBody(e.body_text()))?;
    let entity_id = report.entity_id.clone();

    match state.store.ingest(report) {
        Ok(()) => debug!(entity_id = %entity_id, "Location update accepted"),
        Err(IngestError::Invalid(e)) => {
            debug!(entity_id = %entity_id, error = %e, "Rejected location update");
            return Err(ObserverError::Validation(e));
        }
        Err(IngestError::Store(StoreError::QueueFull)) => {
            warn!(entity_id = %entity_id, "Ingest queue full, dropping location update");
        }
        Err(IngestError::Store(e)) => return Err(ObserverError::Unavailable(e)),
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "location updated",
    })))
}

// ---------------------------------------------------------------------------
// GET /api/tracking/locations
// ---------------------------------------------------------------------------

/// Every location that is not stale.
pub async fn list_locations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.all_current_locations().await)
}

/// The current location of one entity, 404 when unknown or stale.
pub async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let location = state
        .store
        .current_location(&entity_id)
        .await
        .ok_or_else(|| ObserverError::NotFound(format!("no current location for {entity_id}")))?;
    Ok(Json(location))
}

// ---------------------------------------------------------------------------
// GET /api/tracking/entities
// ---------------------------------------------------------------------------

/// Every entity ever seen, with `isActive` computed as of now.
pub async fn list_entities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.all_entities().await)
}
