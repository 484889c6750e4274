//! Shared type definitions for Courier live location tracking.
//!
//! This crate is the single source of truth for the records exchanged
//! between tracking clients, the location store, and observers. Types
//! defined here flow downstream to `TypeScript` via `ts-rs` for the
//! dispatch dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Entity and subscriber identifiers
//! - [`enums`] -- Entity kinds
//! - [`structs`] -- Location samples and tracked-entity records
//! - [`report`] -- Inbound location report shape
//! - [`stream`] -- Outbound real-time messages

pub mod enums;
pub mod ids;
pub mod report;
pub mod stream;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EntityKind, UnknownEntityKind};
pub use ids::{EntityId, SubscriberId};
pub use report::LocationReport;
pub use stream::StreamMessage;
pub use structs::{LocationSample, TrackedEntity};
