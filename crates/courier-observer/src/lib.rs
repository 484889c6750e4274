//! Tracking API server for Courier.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Ingress** (`POST /api/tracking/update`) for location reports from
//!   bikes and riders
//! - **REST queries** for current locations and tracked entities
//! - **`WebSocket` endpoint** (`/api/tracking/ws`) where each connection
//!   becomes a subscriber session: an `initial` snapshot followed by a live
//!   `update` stream, with location reports accepted inbound
//! - **Health and status** (`GET /api/health`, `GET /`)
//!
//! # Architecture
//!
//! Every handler works through a cloned [`LocationStore`] handle held in
//! [`AppState`]. Ingestion never blocks on the store's command loop, and
//! reads take a shared lock on the tracking state directly.
//!
//! [`LocationStore`]: courier_core::LocationStore

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
