//! Core tracking records: the per-entity location sample and the
//! tracked-entity metadata kept alongside it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::EntityKind;
use crate::ids::EntityId;

// ---------------------------------------------------------------------------
// LocationSample
// ---------------------------------------------------------------------------

/// One accepted position report for an entity.
///
/// Immutable once created. The store keeps the latest sample per entity,
/// replacing older ones in the order they were received (not by
/// `timestamp`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LocationSample {
    /// The reporting bike or rider.
    pub entity_id: EntityId,
    /// Whether this is a bike or a rider.
    pub entity_type: EntityKind,
    /// Latitude in degrees, within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, within `[-180, 180]`.
    pub longitude: f64,
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
    /// When the position was true on the device.
    pub timestamp: DateTime<Utc>,
    /// When the server accepted the report.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// TrackedEntity
// ---------------------------------------------------------------------------

/// Metadata about an entity that has reported at least once.
///
/// Entities are never forgotten; once they stop reporting for longer than
/// the stale timeout, `is_active` turns false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TrackedEntity {
    /// The entity identifier.
    pub entity_id: EntityId,
    /// Kind reported with the first sample.
    pub entity_type: EntityKind,
    /// Display name. Defaults to the entity identifier.
    pub name: String,
    /// Latest accepted sample, shared with the current-location map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub last_location: Option<Arc<LocationSample>>,
    /// Whether the entity reported within the stale timeout.
    pub is_active: bool,
    /// Receipt time of the latest sample.
    pub last_update_time: DateTime<Utc>,
}

impl TrackedEntity {
    /// Create the record for an entity seen for the first time.
    pub fn first_seen(sample: Arc<LocationSample>) -> Self {
        Self {
            entity_id: sample.entity_id.clone(),
            entity_type: sample.entity_type,
            name: sample.entity_id.to_string(),
            is_active: true,
            last_update_time: sample.updated_at,
            last_location: Some(sample),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LocationSample {
        let now = Utc::now();
        LocationSample {
            entity_id: EntityId::new("bike-1"),
            entity_type: EntityKind::Bike,
            latitude: 53.27,
            longitude: -9.05,
            altitude: None,
            speed: Some(42.0),
            heading: None,
            accuracy: None,
            timestamp: now,
            updated_at: now,
        }
    }

    #[test]
    fn sample_uses_camel_case_and_omits_absent_fields() {
        let json = serde_json::to_value(sample()).unwrap_or_default();
        assert_eq!(json["entityId"], "bike-1");
        assert_eq!(json["entityType"], "bike");
        assert_eq!(json["speed"], 42.0);
        assert!(json.get("altitude").is_none());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn first_seen_defaults_name_to_id() {
        let entity = TrackedEntity::first_seen(Arc::new(sample()));
        assert_eq!(entity.name, "bike-1");
        assert!(entity.is_active);
        assert_eq!(entity.entity_type, EntityKind::Bike);
    }

    #[test]
    fn entity_serializes_is_active() {
        let entity = TrackedEntity::first_seen(Arc::new(sample()));
        let json = serde_json::to_value(&entity).unwrap_or_default();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["lastLocation"]["entityId"], "bike-1");
    }
}
