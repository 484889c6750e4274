//! Inbound location report shape.
//!
//! The same JSON body is accepted by `POST /api/tracking/update` and as a
//! text frame on the tracking WebSocket. Required fields are modelled as
//! optional or defaulted here so that a missing field reaches validation
//! and gets a precise error instead of a generic decode failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A position report as sent by a tracking client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LocationReport {
    /// Reporting entity. Empty when absent.
    #[serde(default)]
    pub entity_id: String,
    /// `"bike"` or `"rider"`. Empty when absent.
    #[serde(default)]
    pub entity_type: String,
    /// Latitude in degrees.
    #[serde(default)]
    #[ts(optional)]
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    #[serde(default)]
    #[ts(optional)]
    pub longitude: Option<f64>,
    /// Altitude in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub altitude: Option<f64>,
    /// Ground speed in km/h.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub speed: Option<f64>,
    /// Heading in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub heading: Option<f64>,
    /// Horizontal accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub accuracy: Option<f64>,
    /// Device time of the fix. The server's receipt time is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub timestamp: Option<DateTime<Utc>>,
}
