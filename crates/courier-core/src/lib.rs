//! Location store and command loop for Courier live tracking.
//!
//! This crate owns all mutable tracking state: the latest location per
//! entity, the tracked-entity metadata, and the set of live subscribers.
//! Every mutation is serialized through one command loop task; reads take
//! a shared lock and never wait behind it.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait with system and manual implementations.
//! - [`config`] -- Configuration loading from `courier-config.yaml` into
//!   strongly-typed structs.
//! - [`validation`] -- Location report validation shared by every ingress.
//! - [`state`] -- The tracking maps and staleness rules.
//! - [`store`] -- [`LocationStore`], the cloneable handle used by callers.
//! - [`command_loop`] -- The single writer behind the store.
//! - [`error`] -- Store and ingest errors.
//!
//! [`Clock`]: clock::Clock
//! [`LocationStore`]: store::LocationStore

pub mod clock;
pub mod command_loop;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CourierConfig, HttpConfig, LoggingConfig, SessionConfig, TrackingConfig};
pub use error::{IngestError, StoreError};
pub use store::{LocationStore, Subscription};
pub use validation::ValidationError;
