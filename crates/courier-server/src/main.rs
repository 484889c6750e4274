//! Courier live tracking server.
//!
//! Wires the location store to the HTTP + `WebSocket` surface and runs
//! until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `courier-config.yaml` (or `COURIER_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Spawn the location store command loop
//! 4. Bind and spawn the tracking API server
//! 5. Wait for `Ctrl-C`
//!
//! # Shutdown Sequence
//!
//! The store drains first, which closes every subscriber queue and so
//! ends every `WebSocket` session with a close frame. Then the HTTP server
//! stops accepting connections and finishes in-flight requests.

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use courier_core::{CourierConfig, LocationStore, SystemClock};
use courier_observer::{AppState, ServerConfig};
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "courier-config.yaml";

/// Application entry point for the Courier server.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded, the listener
/// cannot bind, or a background task fails.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Config comes first so its log level can seed the filter.
    let (config, config_path, from_file) = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("courier-server starting");
    info!(
        path = %config_path.display(),
        from_file,
        stale_timeout_secs = config.tracking.stale_timeout().as_secs(),
        sweep_interval_secs = config.tracking.sweep_interval().as_secs(),
        ingest_queue_capacity = config.tracking.ingest_queue_capacity,
        subscriber_queue_capacity = config.tracking.subscriber_queue_capacity,
        "Configuration loaded"
    );

    let (store, command_loop) = LocationStore::spawn(&config.tracking, Arc::new(SystemClock));

    let (stop_http, http_stopped) = oneshot::channel::<()>();
    let app_state = Arc::new(AppState::new(store.clone(), config.session));
    let server = courier_observer::spawn_observer(
        &ServerConfig::from(&config.http),
        app_state,
        async move {
            // A dropped sender also means stop.
            let _ = http_stopped.await;
        },
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    store.shutdown();
    command_loop.await?;
    let _ = stop_http.send(());
    server.await?;

    info!("courier-server stopped");
    Ok(())
}

/// Load configuration from `COURIER_CONFIG` or `courier-config.yaml`.
///
/// A missing file yields defaults (environment overrides still apply).
/// Returns the config, the path consulted, and whether the file existed.
fn load_config() -> Result<(CourierConfig, PathBuf, bool), AppError> {
    let path = std::env::var_os("COURIER_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = CourierConfig::from_file(&path)?;
        Ok((config, path, true))
    } else {
        let mut config = CourierConfig::default();
        config.http.apply_env_overrides();
        Ok((config, path, false))
    }
}
