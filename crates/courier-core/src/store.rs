//! The location store handle.
//!
//! [`LocationStore`] is a cheap, cloneable handle shared by the HTTP
//! handlers and every WebSocket session. Writes (`submit`, `subscribe`,
//! `unsubscribe`) go through bounded queues to the
//! [`CommandLoop`](crate::command_loop::CommandLoop), which is the only
//! writer. Reads take a shared lock on the state directly so snapshots
//! never wait behind the queue.
//!
//! Producers never block indefinitely: samples are admitted with
//! `try_send`, and control requests wait at most the configured control
//! timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_types::{LocationReport, LocationSample, StreamMessage, SubscriberId, TrackedEntity};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::command_loop::{CommandLoop, LoopInputs, Registration};
use crate::config::TrackingConfig;
use crate::error::{IngestError, StoreError};
use crate::state::TrackingState;
use crate::validation::validate_report;

/// Handle to the in-memory location store.
#[derive(Debug, Clone)]
pub struct LocationStore {
    state: Arc<RwLock<TrackingState>>,
    clock: Arc<dyn Clock>,
    samples: mpsc::Sender<LocationSample>,
    register: mpsc::Sender<Registration>,
    unregister: mpsc::Sender<SubscriberId>,
    shutdown: Arc<Notify>,
    subscriber_count: Arc<AtomicUsize>,
    subscriber_queue_capacity: usize,
    control_timeout: Duration,
}

impl LocationStore {
    /// Build a store and its command loop. The loop does nothing until
    /// [`CommandLoop::run`] is awaited or spawned.
    ///
    /// Queue capacities of zero are raised to one.
    pub fn new(config: &TrackingConfig, clock: Arc<dyn Clock>) -> (Self, CommandLoop) {
        let state = Arc::new(RwLock::new(TrackingState::new(config.stale_timeout())));
        let (samples_tx, samples_rx) = mpsc::channel(config.ingest_queue_capacity.max(1));
        let (register_tx, register_rx) = mpsc::channel(config.control_queue_capacity.max(1));
        let (unregister_tx, unregister_rx) = mpsc::channel(config.control_queue_capacity.max(1));
        let shutdown = Arc::new(Notify::new());
        let subscriber_count = Arc::new(AtomicUsize::new(0));

        let command_loop = CommandLoop::new(
            Arc::clone(&state),
            Arc::clone(&clock),
            LoopInputs {
                samples: samples_rx,
                register: register_rx,
                unregister: unregister_rx,
                shutdown: Arc::clone(&shutdown),
            },
            config.sweep_interval(),
            Arc::clone(&subscriber_count),
        );

        let store = Self {
            state,
            clock,
            samples: samples_tx,
            register: register_tx,
            unregister: unregister_tx,
            shutdown,
            subscriber_count,
            subscriber_queue_capacity: config.subscriber_queue_capacity.max(1),
            control_timeout: config.control_timeout(),
        };

        (store, command_loop)
    }

    /// Build a store and spawn its command loop on the current runtime.
    pub fn spawn(config: &TrackingConfig, clock: Arc<dyn Clock>) -> (Self, JoinHandle<()>) {
        let (store, command_loop) = Self::new(config, clock);
        let handle = tokio::spawn(command_loop.run());
        (store, handle)
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Enqueue an already validated sample for the command loop.
    ///
    /// Never waits. The mutation happens later; its outcome is not
    /// reported back.
    ///
    /// # Errors
    ///
    /// [`StoreError::QueueFull`] if the ingest queue is full (the sample is
    /// not enqueued), [`StoreError::Closed`] if the loop has stopped.
    pub fn submit(&self, sample: LocationSample) -> Result<(), StoreError> {
        self.samples.try_send(sample).map_err(|e| match e {
            TrySendError::Full(_) => StoreError::QueueFull,
            TrySendError::Closed(_) => StoreError::Closed,
        })
    }

    /// Validate a raw report, stamp it with the receipt time, and submit it.
    ///
    /// # Errors
    ///
    /// [`IngestError::Invalid`] if validation fails (nothing is enqueued),
    /// otherwise the [`submit`](Self::submit) errors.
    pub fn ingest(&self, report: LocationReport) -> Result<(), IngestError> {
        let sample = validate_report(report, self.now())?;
        self.submit(sample)?;
        Ok(())
    }

    /// Register a new subscriber.
    ///
    /// The command loop seeds the new queue with a
    /// [`StreamMessage::Initial`] snapshot before the subscriber can see any
    /// update, so the first message received is always the snapshot.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if the loop did not register the subscriber
    /// within the control timeout, [`StoreError::Closed`] if it has stopped.
    pub async fn subscribe(&self) -> Result<Subscription, StoreError> {
        let id = SubscriberId::new();
        let (outbound, receiver) = mpsc::channel(self.subscriber_queue_capacity);
        let (ack, registered) = oneshot::channel();
        let registration = Registration { id, outbound, ack };

        tokio::time::timeout(self.control_timeout, async {
            self.register
                .send(registration)
                .await
                .map_err(|_closed| StoreError::Closed)?;
            registered.await.map_err(|_dropped| StoreError::Closed)
        })
        .await
        .map_err(|_elapsed| StoreError::Timeout)??;

        Ok(Subscription { id, receiver })
    }

    /// Remove a subscriber and close its queue. Removing an unknown or
    /// already removed subscriber is a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if the request was not admitted within the
    /// control timeout, [`StoreError::Closed`] if the loop has stopped (in
    /// which case every queue is already closed).
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<(), StoreError> {
        tokio::time::timeout(self.control_timeout, self.unregister.send(id))
            .await
            .map_err(|_elapsed| StoreError::Timeout)?
            .map_err(|_closed| StoreError::Closed)
    }

    /// Ask the command loop to drain and stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Latest sample for an entity, or `None` if it is unknown or stale.
    pub async fn current_location(&self, entity_id: &str) -> Option<Arc<LocationSample>> {
        let now = self.now();
        self.state.read().await.current_location(entity_id, now)
    }

    /// Every non-stale sample, unordered.
    pub async fn all_current_locations(&self) -> Vec<Arc<LocationSample>> {
        let now = self.now();
        self.state.read().await.current_locations(now)
    }

    /// Every entity ever seen, with `is_active` computed as of now.
    pub async fn all_entities(&self) -> Vec<TrackedEntity> {
        let now = self.now();
        self.state.read().await.entities(now)
    }

    /// Number of entities ever seen.
    pub async fn entity_count(&self) -> usize {
        self.state.read().await.entity_count()
    }

    /// Number of live subscribers, as last published by the command loop.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Acquire)
    }
}

/// One registered subscriber's end of the broadcast.
///
/// Yields the initial snapshot first, then updates in the order the
/// command loop accepted them. `recv` returns `None` once the subscriber
/// has been unregistered (or the store has shut down) and the queue is
/// drained.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<StreamMessage>,
}

impl Subscription {
    /// The identifier to pass to [`LocationStore::unsubscribe`].
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        self.receiver.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<StreamMessage> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use courier_types::{EntityId, EntityKind};

    use super::*;
    use crate::clock::ManualClock;

    fn report(id: &str, lat: f64, lon: f64) -> LocationReport {
        LocationReport {
            entity_id: id.to_owned(),
            entity_type: String::from("bike"),
            latitude: Some(lat),
            longitude: Some(lon),
            ..LocationReport::default()
        }
    }

    fn start(config: &TrackingConfig) -> (LocationStore, Arc<ManualClock>, JoinHandle<()>) {
        let clock = Arc::new(ManualClock::default());
        let (store, handle) = LocationStore::spawn(config, Arc::clone(&clock) as Arc<dyn Clock>);
        (store, clock, handle)
    }

    async fn subscribed(store: &LocationStore) -> Subscription {
        match store.subscribe().await {
            Ok(sub) => sub,
            Err(e) => panic!("subscribe failed: {e}"),
        }
    }

    async fn next_update(sub: &mut Subscription) -> Option<Arc<LocationSample>> {
        match sub.recv().await {
            Some(StreamMessage::Update { location }) => Some(location),
            _ => None,
        }
    }

    #[tokio::test]
    async fn latest_submitted_sample_is_current() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;
        assert!(matches!(sub.recv().await, Some(StreamMessage::Initial { .. })));

        for lat in [53.0, 53.1, 53.2] {
            assert!(store.ingest(report("bike-1", lat, -9.0)).is_ok());
        }
        for _ in 0..3 {
            assert!(next_update(&mut sub).await.is_some());
        }

        let current = store.current_location("bike-1").await;
        assert_eq!(current.map(|s| s.latitude), Some(53.2));
    }

    #[tokio::test]
    async fn invalid_reports_never_reach_the_state() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;
        let _initial = sub.recv().await;

        assert!(matches!(
            store.ingest(report("bike-1", 91.0, 0.0)),
            Err(IngestError::Invalid(_))
        ));
        assert!(matches!(
            store.ingest(report("bike-1", 0.0, 200.0)),
            Err(IngestError::Invalid(_))
        ));
        // A valid report for another entity acts as a barrier.
        assert!(store.ingest(report("bike-2", 1.0, 1.0)).is_ok());
        let _ = next_update(&mut sub).await;

        assert!(store.current_location("bike-1").await.is_none());
        assert_eq!(store.entity_count().await, 1);
    }

    #[tokio::test]
    async fn first_sample_creates_one_active_entity() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;
        let _initial = sub.recv().await;

        assert!(store.ingest(report("rider-9", 10.0, 10.0)).is_ok());
        let _ = next_update(&mut sub).await;

        let entities = store.all_entities().await;
        let matching: Vec<_> = entities
            .iter()
            .filter(|e| e.entity_id == EntityId::new("rider-9"))
            .collect();
        assert_eq!(matching.len(), 1);
        assert!(matching.iter().all(|e| e.is_active));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_marks_stale_entities_without_traffic() {
        let config = TrackingConfig {
            sweep_interval_secs: 1,
            ..TrackingConfig::default()
        };
        let (store, clock, _handle) = start(&config);
        let mut sub = subscribed(&store).await;
        let _initial = sub.recv().await;

        assert!(store.ingest(report("bike-1", 53.27, -9.05)).is_ok());
        let _ = next_update(&mut sub).await;
        assert_eq!(store.state.read().await.stored_active_flag("bike-1"), Some(true));

        clock.advance(TimeDelta::seconds(301));
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The stored flag was flipped by the sweep, not by a read.
        assert_eq!(store.state.read().await.stored_active_flag("bike-1"), Some(false));
        assert!(store.all_current_locations().await.is_empty());
    }

    #[tokio::test]
    async fn stale_entity_scenario() {
        let (store, clock, _handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;
        let _initial = sub.recv().await;

        assert!(store.ingest(report("bike-1", 53.27, -9.05)).is_ok());
        let _ = next_update(&mut sub).await;

        let found = store.current_location("bike-1").await;
        assert_eq!(found.as_ref().map(|s| s.latitude), Some(53.27));
        assert_eq!(found.map(|s| s.entity_type), Some(EntityKind::Bike));

        clock.advance(TimeDelta::minutes(6));

        assert!(store.current_location("bike-1").await.is_none());
        let entities = store.all_entities().await;
        assert_eq!(entities.len(), 1);
        assert!(entities.iter().all(|e| e.entity_id.as_str() == "bike-1" && !e.is_active));
    }

    #[tokio::test]
    async fn subscriber_gets_initial_then_updates_in_order() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;

        match sub.recv().await {
            Some(StreamMessage::Initial { locations }) => assert!(locations.is_empty()),
            other => panic!("expected initial snapshot, got {other:?}"),
        }

        for (id, lat) in [("a", 0.0), ("b", 1.0), ("c", 2.0)] {
            assert!(store.ingest(report(id, lat, 0.0)).is_ok());
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            if let Some(location) = next_update(&mut sub).await {
                seen.push(location.entity_id.to_string());
            }
        }
        assert_eq!(seen, ["a", "b", "c"]);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn initial_snapshot_contains_existing_locations() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let mut first = subscribed(&store).await;
        let _initial = first.recv().await;
        assert!(store.ingest(report("bike-1", 1.0, 1.0)).is_ok());
        let _ = next_update(&mut first).await;

        let mut second = subscribed(&store).await;
        match second.recv().await {
            Some(StreamMessage::Initial { locations }) => {
                assert_eq!(locations.len(), 1);
                assert_eq!(locations.first().map(|l| l.entity_id.as_str()), Some("bike-1"));
            }
            other => panic!("expected initial snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_others_or_ingestion() {
        let config = TrackingConfig {
            subscriber_queue_capacity: 2,
            ..TrackingConfig::default()
        };
        let (store, _clock, _handle) = start(&config);
        let mut slow = subscribed(&store).await;
        let mut fast = subscribed(&store).await;
        let _initial = fast.recv().await;

        for i in 0..10_u8 {
            assert!(store.ingest(report("bike-1", f64::from(i), 0.0)).is_ok());
            let update = next_update(&mut fast).await;
            assert_eq!(update.map(|s| s.latitude), Some(f64::from(i)));
        }

        // Initial snapshot plus the one update that fit; the rest were dropped.
        assert!(matches!(slow.try_recv(), Some(StreamMessage::Initial { .. })));
        assert!(matches!(slow.try_recv(), Some(StreamMessage::Update { .. })));
        assert!(slow.try_recv().is_none());
        assert_eq!(store.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_closes_queue_and_is_idempotent() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;
        let id = sub.id();

        assert!(store.unsubscribe(id).await.is_ok());
        assert!(store.unsubscribe(id).await.is_ok());

        assert!(matches!(sub.recv().await, Some(StreamMessage::Initial { .. })));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned_on_broadcast() {
        let (store, _clock, _handle) = start(&TrackingConfig::default());
        let dropped = subscribed(&store).await;
        let mut kept = subscribed(&store).await;
        let _initial = kept.recv().await;
        assert_eq!(store.subscriber_count(), 2);

        drop(dropped);
        assert!(store.ingest(report("bike-1", 1.0, 1.0)).is_ok());
        let _ = next_update(&mut kept).await;

        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_and_closes() {
        let (store, _clock, handle) = start(&TrackingConfig::default());
        let mut sub = subscribed(&store).await;

        assert!(store.ingest(report("bike-1", 1.0, 1.0)).is_ok());
        store.shutdown();
        assert!(handle.await.is_ok());

        // The queued sample was applied before the loop stopped.
        assert!(store.current_location("bike-1").await.is_some());
        assert!(matches!(sub.recv().await, Some(StreamMessage::Initial { .. })));
        assert!(matches!(sub.recv().await, Some(StreamMessage::Update { .. })));
        assert!(sub.recv().await.is_none());

        assert_eq!(
            store.ingest(report("late", 0.0, 0.0)),
            Err(IngestError::Store(StoreError::Closed))
        );
        assert!(matches!(store.subscribe().await, Err(StoreError::Closed)));
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn full_ingest_queue_is_reported() {
        let config = TrackingConfig {
            ingest_queue_capacity: 1,
            ..TrackingConfig::default()
        };
        // Loop never runs, so nothing is consumed.
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let (store, _command_loop) = LocationStore::new(&config, clock);

        assert!(store.ingest(report("bike-1", 1.0, 1.0)).is_ok());
        assert_eq!(
            store.ingest(report("bike-1", 2.0, 1.0)),
            Err(IngestError::Store(StoreError::QueueFull))
        );
    }

    #[tokio::test]
    async fn subscribe_times_out_when_loop_is_not_running() {
        let config = TrackingConfig {
            control_timeout_ms: 20,
            ..TrackingConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let (store, _command_loop) = LocationStore::new(&config, clock);

        assert!(matches!(store.subscribe().await, Err(StoreError::Timeout)));
    }
}
