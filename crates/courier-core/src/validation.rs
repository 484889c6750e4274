//! Validation of inbound location reports.
//!
//! Shared by the HTTP ingress and the WebSocket inbound pump. A report is
//! accepted only if it names an entity, carries a recognized entity type,
//! and has coordinates inside the valid ranges. Optional telemetry
//! (altitude, speed, heading, accuracy) passes through unchecked.

use chrono::{DateTime, Utc};
use courier_types::{EntityId, EntityKind, LocationReport, LocationSample};

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: core::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: core::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Why a location report was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// `entityId` was absent or empty.
    #[error("entityId is required")]
    MissingEntityId,

    /// `entityType` was absent or empty.
    #[error("entityType is required")]
    MissingEntityType,

    /// `entityType` was not one of the recognized kinds.
    #[error("entityType must be 'bike' or 'rider', got '{0}'")]
    UnknownEntityType(String),

    /// A coordinate was absent.
    #[error("{0} is required")]
    MissingCoordinate(&'static str),

    /// Latitude outside `[-90, 90]` (or not finite).
    #[error("latitude {0} is out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside `[-180, 180]` (or not finite).
    #[error("longitude {0} is out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// Check that a coordinate pair lies within the valid ranges.
///
/// NaN fails both range checks.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !LATITUDE_RANGE.contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !LONGITUDE_RANGE.contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    Ok(())
}

/// Validate a report and turn it into a [`LocationSample`] received at
/// `received_at`.
///
/// The sample's `timestamp` is the report's own timestamp, or
/// `received_at` when the client did not send one.
pub fn validate_report(
    report: LocationReport,
    received_at: DateTime<Utc>,
) -> Result<LocationSample, ValidationError> {
    if report.entity_id.is_empty() {
        return Err(ValidationError::MissingEntityId);
    }
    if report.entity_type.is_empty() {
        return Err(ValidationError::MissingEntityType);
    }
    let entity_type: EntityKind = report
        .entity_type
        .parse()
        .map_err(|e: courier_types::UnknownEntityKind| ValidationError::UnknownEntityType(e.0))?;

    let latitude = report
        .latitude
        .ok_or(ValidationError::MissingCoordinate("latitude"))?;
    let longitude = report
        .longitude
        .ok_or(ValidationError::MissingCoordinate("longitude"))?;
    validate_coordinates(latitude, longitude)?;

    Ok(LocationSample {
        entity_id: EntityId::new(report.entity_id),
        entity_type,
        latitude,
        longitude,
        altitude: report.altitude,
        speed: report.speed,
        heading: report.heading,
        accuracy: report.accuracy,
        timestamp: report.timestamp.unwrap_or(received_at),
        updated_at: received_at,
    })
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn report(lat: f64, lon: f64) -> LocationReport {
        LocationReport {
            entity_id: String::from("bike-1"),
            entity_type: String::from("bike"),
            latitude: Some(lat),
            longitude: Some(lon),
            ..LocationReport::default()
        }
    }

    #[test]
    fn accepts_valid_report() {
        let now = Utc::now();
        let sample = validate_report(report(53.27, -9.05), now);
        assert!(sample.is_ok());
        let sample = sample.ok();
        assert_eq!(sample.as_ref().map(|s| s.entity_type), Some(EntityKind::Bike));
        assert_eq!(sample.as_ref().map(|s| s.updated_at), Some(now));
        assert_eq!(sample.map(|s| s.timestamp), Some(now));
    }

    #[test]
    fn accepts_boundary_coordinates() {
        let now = Utc::now();
        assert!(validate_report(report(90.0, 180.0), now).is_ok());
        assert!(validate_report(report(-90.0, -180.0), now).is_ok());
    }

    #[test]
    fn rejects_latitude_91() {
        let result = validate_report(report(91.0, 0.0), Utc::now());
        assert_eq!(result, Err(ValidationError::LatitudeOutOfRange(91.0)));
    }

    #[test]
    fn rejects_longitude_200() {
        let result = validate_report(report(0.0, 200.0), Utc::now());
        assert_eq!(result, Err(ValidationError::LongitudeOutOfRange(200.0)));
    }

    #[test]
    fn rejects_nan() {
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::NAN).is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        let now = Utc::now();

        let mut r = report(0.0, 0.0);
        r.entity_id.clear();
        assert_eq!(validate_report(r, now), Err(ValidationError::MissingEntityId));

        let mut r = report(0.0, 0.0);
        r.entity_type.clear();
        assert_eq!(validate_report(r, now), Err(ValidationError::MissingEntityType));

        let mut r = report(0.0, 0.0);
        r.latitude = None;
        assert_eq!(
            validate_report(r, now),
            Err(ValidationError::MissingCoordinate("latitude"))
        );
    }

    #[test]
    fn rejects_unknown_entity_type() {
        let mut r = report(0.0, 0.0);
        r.entity_type = String::from("car");
        assert_eq!(
            validate_report(r, Utc::now()),
            Err(ValidationError::UnknownEntityType(String::from("car")))
        );
    }

    #[test]
    fn keeps_client_timestamp_and_optional_fields() {
        let now = Utc::now();
        let earlier = now - TimeDelta::seconds(30);
        let mut r = report(10.0, 10.0);
        r.timestamp = Some(earlier);
        r.heading = Some(720.0);
        r.speed = Some(-3.0);

        let sample = validate_report(r, now).ok();
        assert_eq!(sample.as_ref().map(|s| s.timestamp), Some(earlier));
        assert_eq!(sample.as_ref().map(|s| s.updated_at), Some(now));
        assert_eq!(sample.as_ref().and_then(|s| s.heading), Some(720.0));
        assert_eq!(sample.and_then(|s| s.speed), Some(-3.0));
    }
}
