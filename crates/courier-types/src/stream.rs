//! Messages pushed to real-time observers over the tracking WebSocket.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::LocationSample;

/// A message delivered to one subscriber.
///
/// Internally tagged by `type`:
///
/// - `{"type":"initial","locations":[...]}` once, first, on every session
/// - `{"type":"update","location":{...}}` for every accepted sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum StreamMessage {
    /// Snapshot of all non-stale locations at subscription time.
    Initial {
        /// Current locations, unordered.
        locations: Vec<Arc<LocationSample>>,
    },
    /// A single newly accepted sample.
    Update {
        /// The accepted sample.
        location: Arc<LocationSample>,
    },
}
