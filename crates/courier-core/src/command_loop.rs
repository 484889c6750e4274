//! The single-writer command loop behind [`LocationStore`].
//!
//! One task owns every mutation of the tracking state and the subscriber
//! set. It selects over four inputs (subscriber registrations,
//! unregistrations, incoming samples, and the staleness sweep timer) plus a
//! shutdown signal, and handles one event to completion before taking the
//! next. Broadcasts therefore always see the state they describe.
//!
//! # States
//!
//! - **Running**: the select loop above.
//! - **Draining**: entered on [`LocationStore::shutdown`] or when every
//!   store handle is gone. Samples already queued are applied and
//!   broadcast, pending registrations are refused, and every subscriber
//!   queue is closed. Then the task returns.
//!
//! [`LocationStore`]: crate::store::LocationStore
//! [`LocationStore::shutdown`]: crate::store::LocationStore::shutdown

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use courier_types::{LocationSample, StreamMessage, SubscriberId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, RwLock, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::state::TrackingState;

/// A request to add a subscriber, carried on the register queue.
#[derive(Debug)]
pub(crate) struct Registration {
    /// Identifier assigned by the caller.
    pub id: SubscriberId,
    /// Sending half of the subscriber's outbound queue.
    pub outbound: mpsc::Sender<StreamMessage>,
    /// Completed once the subscriber is live.
    pub ack: oneshot::Sender<()>,
}

/// Receiving ends of the store's input queues, bundled for construction.
#[derive(Debug)]
pub(crate) struct LoopInputs {
    pub samples: mpsc::Receiver<LocationSample>,
    pub register: mpsc::Receiver<Registration>,
    pub unregister: mpsc::Receiver<SubscriberId>,
    pub shutdown: Arc<Notify>,
}

/// The command loop task. Obtain one from
/// [`LocationStore::new`](crate::store::LocationStore::new) and drive it
/// with [`run`](Self::run).
#[derive(Debug)]
pub struct CommandLoop {
    state: Arc<RwLock<TrackingState>>,
    clock: Arc<dyn Clock>,
    inputs: LoopInputs,
    sweep_interval: Duration,
    subscribers: BTreeMap<SubscriberId, mpsc::Sender<StreamMessage>>,
    subscriber_count: Arc<AtomicUsize>,
}

impl CommandLoop {
    pub(crate) fn new(
        state: Arc<RwLock<TrackingState>>,
        clock: Arc<dyn Clock>,
        inputs: LoopInputs,
        sweep_interval: Duration,
        subscriber_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            state,
            clock,
            inputs,
            sweep_interval,
            subscribers: BTreeMap::new(),
            subscriber_count,
        }
    }

    /// Run until shutdown is requested or every store handle is dropped.
    pub async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to sweep yet.
        sweep.tick().await;

        let stale_timeout_secs = self.state.read().await.stale_timeout().num_seconds();
        info!(
            sweep_interval_secs = self.sweep_interval.as_secs(),
            stale_timeout_secs,
            "Location store command loop running"
        );

        let shutdown = Arc::clone(&self.inputs.shutdown);
        loop {
            tokio::select! {
                () = shutdown.notified() => {
                    info!("Location store shutdown requested");
                    break;
                }
                Some(registration) = self.inputs.register.recv() => {
                    self.register_subscriber(registration).await;
                }
                Some(id) = self.inputs.unregister.recv() => {
                    self.unregister_subscriber(id);
                }
                sample = self.inputs.samples.recv() => {
                    let Some(sample) = sample else {
                        debug!("All location store handles dropped");
                        break;
                    };
                    self.handle_sample(sample).await;
                }
                _ = sweep.tick() => {
                    self.sweep_stale().await;
                }
            }
        }

        self.drain().await;
    }

    /// Apply one sample and broadcast it.
    async fn handle_sample(&mut self, sample: LocationSample) {
        let sample = Arc::new(sample);
        let first_seen = self.state.write().await.apply(Arc::clone(&sample));
        if first_seen {
            info!(
                entity_id = %sample.entity_id,
                entity_type = %sample.entity_type,
                "Tracking new entity"
            );
        }
        self.broadcast(&StreamMessage::Update { location: sample });
    }

    /// Offer `message` to every subscriber without blocking.
    ///
    /// A full queue loses this message for that subscriber only. A closed
    /// queue means the session went away without unsubscribing, so the
    /// subscriber is dropped.
    fn broadcast(&mut self, message: &StreamMessage) {
        let mut gone: Vec<SubscriberId> = Vec::new();
        for (id, outbound) in &self.subscribers {
            match outbound.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = %id, "Subscriber queue full, dropping update");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            debug!(subscriber = %id, "Pruning subscriber with closed queue");
            self.subscribers.remove(&id);
        }
        self.publish_subscriber_count();
    }

    /// Add a subscriber and seed its queue with the current snapshot.
    async fn register_subscriber(&mut self, registration: Registration) {
        let Registration { id, outbound, ack } = registration;

        let now = self.clock.now();
        let locations = self.state.read().await.current_locations(now);
        let count = locations.len();
        // The queue is brand new, so the snapshot always fits.
        if outbound.try_send(StreamMessage::Initial { locations }).is_err() {
            debug!(subscriber = %id, "Subscriber went away before registration");
            return;
        }
        if ack.send(()).is_err() {
            debug!(subscriber = %id, "Subscriber gave up waiting for registration");
            return;
        }

        self.subscribers.insert(id, outbound);
        self.publish_subscriber_count();
        debug!(subscriber = %id, initial_locations = count, "Subscriber registered");
    }

    /// Remove a subscriber. Dropping its sender closes the queue; removing
    /// an unknown id does nothing.
    fn unregister_subscriber(&mut self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            self.publish_subscriber_count();
            debug!(subscriber = %id, "Subscriber unregistered");
        }
    }

    /// Flip stale entities to inactive.
    async fn sweep_stale(&self) {
        let now = self.clock.now();
        let flipped = self.state.write().await.sweep(now);
        if flipped > 0 {
            info!(entities = flipped, "Marked stale entities inactive");
        }
    }

    /// Apply whatever is already queued, refuse new work, and close every
    /// subscriber queue.
    async fn drain(&mut self) {
        self.inputs.samples.close();
        self.inputs.register.close();
        self.inputs.unregister.close();

        let mut applied: usize = 0;
        while let Ok(sample) = self.inputs.samples.try_recv() {
            self.handle_sample(sample).await;
            applied = applied.saturating_add(1);
        }
        // Dropping the registrations drops their acks, which fails the
        // pending `subscribe` calls.
        while self.inputs.register.try_recv().is_ok() {}

        let closed = self.subscribers.len();
        self.subscribers.clear();
        self.publish_subscriber_count();

        info!(
            drained_samples = applied,
            closed_subscribers = closed,
            "Location store command loop stopped"
        );
    }

    fn publish_subscriber_count(&self) {
        self.subscriber_count
            .store(self.subscribers.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::TrackingConfig;
    use crate::store::LocationStore;

    const fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn run_future_is_send() {
        let (_store, command_loop) =
            LocationStore::new(&TrackingConfig::default(), Arc::new(ManualClock::default()));
        let run = command_loop.run();
        assert_send(&run);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_on_a_multi_thread_runtime() {
        let (store, handle) =
            LocationStore::spawn(&TrackingConfig::default(), Arc::new(ManualClock::default()));
        store.shutdown();
        assert!(handle.await.is_ok());
    }
}
