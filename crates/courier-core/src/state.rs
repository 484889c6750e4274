//! Tracking state: the current-location map and tracked-entity metadata.
//!
//! [`TrackingState`] is plain data with synchronous methods. The command
//! loop is its only writer; readers take a shared lock on it through
//! [`LocationStore`](crate::store::LocationStore). Staleness is computed
//! against a caller-supplied `now` so the same rules serve reads, the
//! periodic sweep, and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use courier_types::{EntityId, LocationSample, TrackedEntity};

/// Latest sample and metadata for every entity ever seen.
#[derive(Debug, Clone)]
pub struct TrackingState {
    /// Entity id -> latest sample (last write wins, by receipt order).
    locations: BTreeMap<EntityId, Arc<LocationSample>>,
    /// Entity id -> metadata. Entries are never removed.
    entities: BTreeMap<EntityId, TrackedEntity>,
    /// Maximum age of the latest sample for an entity to count as active.
    stale_timeout: TimeDelta,
}

impl TrackingState {
    /// Create an empty state with the given stale timeout.
    pub fn new(stale_timeout: std::time::Duration) -> Self {
        Self {
            locations: BTreeMap::new(),
            entities: BTreeMap::new(),
            stale_timeout: TimeDelta::from_std(stale_timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    /// The configured stale timeout.
    pub const fn stale_timeout(&self) -> TimeDelta {
        self.stale_timeout
    }

    /// Whether something received at `received_at` is still fresh at `now`.
    pub fn is_fresh(&self, received_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(received_at) <= self.stale_timeout
    }

    /// Record a newly accepted sample.
    ///
    /// Replaces any previous sample for the entity, creates the entity
    /// record on first sight, and marks it active. Returns `true` when the
    /// entity was seen for the first time.
    pub fn apply(&mut self, sample: Arc<LocationSample>) -> bool {
        let id = sample.entity_id.clone();
        self.locations.insert(id.clone(), Arc::clone(&sample));

        if let Some(entity) = self.entities.get_mut(&id) {
            entity.last_update_time = sample.updated_at;
            entity.last_location = Some(sample);
            entity.is_active = true;
            false
        } else {
            self.entities.insert(id, TrackedEntity::first_seen(sample));
            true
        }
    }

    /// Mark every entity whose last update is older than the stale timeout
    /// as inactive. Nothing is deleted. Returns how many entities flipped
    /// from active to inactive.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let timeout = self.stale_timeout;
        let mut flipped: usize = 0;
        for entity in self.entities.values_mut() {
            let stale = now.signed_duration_since(entity.last_update_time) > timeout;
            if stale && entity.is_active {
                entity.is_active = false;
                flipped = flipped.saturating_add(1);
            }
        }
        flipped
    }

    /// Latest sample for `entity_id`, unless unknown or stale at `now`.
    pub fn current_location(&self, entity_id: &str, now: DateTime<Utc>) -> Option<Arc<LocationSample>> {
        self.locations
            .get(entity_id)
            .filter(|sample| self.is_fresh(sample.updated_at, now))
            .cloned()
    }

    /// All samples that are fresh at `now`, in entity-id order.
    pub fn current_locations(&self, now: DateTime<Utc>) -> Vec<Arc<LocationSample>> {
        self.locations
            .values()
            .filter(|sample| self.is_fresh(sample.updated_at, now))
            .cloned()
            .collect()
    }

    /// Every entity ever seen, with `is_active` recomputed for `now`.
    pub fn entities(&self, now: DateTime<Utc>) -> Vec<TrackedEntity> {
        self.entities
            .values()
            .map(|entity| {
                let mut snapshot = entity.clone();
                snapshot.is_active = self.is_fresh(entity.last_update_time, now);
                snapshot
            })
            .collect()
    }

    /// Number of entities ever seen.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Stored `is_active` flag for an entity, as last written by
    /// [`apply`](Self::apply) or [`sweep`](Self::sweep).
    #[cfg(test)]
    pub(crate) fn stored_active_flag(&self, entity_id: &str) -> Option<bool> {
        self.entities.get(entity_id).map(|e| e.is_active)
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use std::time::Duration;

    use courier_types::EntityKind;

    use super::*;

    fn sample(id: &str, lat: f64, at: DateTime<Utc>) -> Arc<LocationSample> {
        Arc::new(LocationSample {
            entity_id: EntityId::new(id),
            entity_type: EntityKind::Bike,
            latitude: lat,
            longitude: -9.05,
            altitude: None,
            speed: None,
            heading: None,
            accuracy: None,
            timestamp: at,
            updated_at: at,
        })
    }

    fn five_minutes() -> TrackingState {
        TrackingState::new(Duration::from_secs(300))
    }

    #[test]
    fn apply_creates_entity_once() {
        let mut state = five_minutes();
        let now = Utc::now();

        assert!(state.apply(sample("bike-1", 53.0, now)));
        assert!(!state.apply(sample("bike-1", 53.1, now)));

        let entities = state.entities(now);
        assert_eq!(entities.len(), 1);
        assert!(entities.iter().all(|e| e.is_active));
        assert_eq!(entities.first().map(|e| e.name.as_str()), Some("bike-1"));
    }

    #[test]
    fn latest_sample_wins_by_receipt_order() {
        let mut state = five_minutes();
        let now = Utc::now();

        state.apply(sample("bike-1", 53.0, now));
        // Older event time, but received later: still replaces.
        let mut late = (*sample("bike-1", 54.0, now)).clone();
        late.timestamp = now - TimeDelta::hours(1);
        state.apply(Arc::new(late));

        let current = state.current_location("bike-1", now);
        assert_eq!(current.map(|s| s.latitude), Some(54.0));
    }

    #[test]
    fn entity_shares_the_stored_sample() {
        let mut state = five_minutes();
        let now = Utc::now();
        state.apply(sample("bike-1", 53.0, now));

        let stored = state.current_location("bike-1", now);
        let entity_loc = state
            .entities(now)
            .into_iter()
            .next()
            .and_then(|e| e.last_location);
        assert!(matches!((stored, entity_loc), (Some(a), Some(b)) if Arc::ptr_eq(&a, &b)));
    }

    #[test]
    fn stale_location_is_hidden_but_entity_remains() {
        let mut state = five_minutes();
        let start = Utc::now();
        state.apply(sample("bike-1", 53.27, start));

        let later = start + TimeDelta::seconds(301);
        assert!(state.current_location("bike-1", later).is_none());
        assert!(state.current_locations(later).is_empty());

        let entities = state.entities(later);
        assert_eq!(entities.len(), 1);
        assert!(entities.iter().all(|e| !e.is_active));
    }

    #[test]
    fn exactly_at_timeout_is_still_fresh() {
        let mut state = five_minutes();
        let start = Utc::now();
        state.apply(sample("bike-1", 53.27, start));

        let edge = start + TimeDelta::seconds(300);
        assert!(state.current_location("bike-1", edge).is_some());
    }

    #[test]
    fn sweep_flips_only_stale_entities() {
        let mut state = five_minutes();
        let start = Utc::now();
        state.apply(sample("old", 1.0, start));
        state.apply(sample("new", 2.0, start + TimeDelta::seconds(200)));

        let now = start + TimeDelta::seconds(400);
        assert_eq!(state.sweep(now), 1);
        assert_eq!(state.stored_active_flag("old"), Some(false));
        assert_eq!(state.stored_active_flag("new"), Some(true));

        // Already inactive entities are not counted again.
        assert_eq!(state.sweep(now), 0);
    }

    #[test]
    fn new_sample_reactivates_entity() {
        let mut state = five_minutes();
        let start = Utc::now();
        state.apply(sample("bike-1", 1.0, start));

        let later = start + TimeDelta::minutes(10);
        state.sweep(later);
        assert_eq!(state.stored_active_flag("bike-1"), Some(false));

        state.apply(sample("bike-1", 1.5, later));
        assert_eq!(state.stored_active_flag("bike-1"), Some(true));
        assert_eq!(state.entity_count(), 1);
    }

    #[test]
    fn unknown_entity_is_not_found() {
        let state = five_minutes();
        assert!(state.current_location("nobody", Utc::now()).is_none());
    }
}
