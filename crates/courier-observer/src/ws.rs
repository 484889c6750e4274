//! `WebSocket` subscriber sessions.
//!
//! Clients connect to `GET /api/tracking/ws`. Each connection registers a
//! subscriber with the store and runs two pumps over the split socket:
//!
//! - The **outbound pump** drains the subscriber queue in order and writes
//!   each [`StreamMessage`] as a JSON text frame. The first message is
//!   always the `initial` snapshot. When nothing has been written for a
//!   heartbeat interval it sends a ping. A failed or timed-out write ends
//!   the session; a closed queue ends it with a close frame.
//! - The **inbound pump** reads frames until close, error, end of stream,
//!   or the idle window passes with no frame at all. Text frames that
//!   decode as a [`LocationReport`] and pass validation are ingested.
//!   Everything else is ignored.
//!
//! Whichever pump stops first tears the session down. The teardown guard
//! lets exactly one caller unsubscribe and signal the other pump. The
//! signal carries why the session ended, so the outbound pump only sends
//! a close frame when the peer has not already closed.
//!
//! [`StreamMessage`]: courier_types::StreamMessage

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use courier_core::{IngestError, LocationStore, SessionConfig, StoreError, Subscription};
use courier_types::{LocationReport, SubscriberId};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` subscriber session.
///
/// # Route
///
/// `GET /api/tracking/ws`
pub async fn ws_tracking(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Run one subscriber session to completion.
async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, stream) = socket.split();
    let write_timeout = state.session.write_timeout();

    let subscription = match state.store.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "Could not register WebSocket subscriber");
            let frame = close_frame(close_code::AWAY, "tracking unavailable");
            write_frame(&mut sink, frame, write_timeout).await;
            return;
        }
    };

    let id = subscription.id();
    debug!(subscriber = %id, "WebSocket subscriber connected");

    let (stop_tx, stop_rx) = watch::channel(None);
    let teardown = Teardown::new(state.store.clone(), id, stop_tx);

    tokio::join!(
        outbound_pump(sink, subscription, &teardown, stop_rx.clone(), state.session),
        inbound_pump(stream, &state.store, &teardown, stop_rx, state.session.idle_timeout()),
    );
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    ClientClosed,
    EndOfStream,
    ReadError,
    IdleTimeout,
    QueueClosed,
    WriteFailed,
}

impl SessionEnd {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client closed",
            Self::EndOfStream => "end of stream",
            Self::ReadError => "read error",
            Self::IdleTimeout => "idle timeout",
            Self::QueueClosed => "subscriber queue closed",
            Self::WriteFailed => "write failed",
        }
    }

    /// Whether the outbound pump should still send a normal close frame
    /// after the inbound pump ended the session for this reason.
    ///
    /// Only an idle peer is still listening. A client close was already
    /// answered by the socket, and a broken read means the peer is gone.
    const fn owes_close_frame(self) -> bool {
        matches!(self, Self::IdleTimeout)
    }
}

/// Exactly-once session teardown shared by both pumps.
#[derive(Debug)]
struct Teardown {
    store: LocationStore,
    id: SubscriberId,
    done: AtomicBool,
    stop: watch::Sender<Option<SessionEnd>>,
}

impl Teardown {
    const fn new(
        store: LocationStore,
        id: SubscriberId,
        stop: watch::Sender<Option<SessionEnd>>,
    ) -> Self {
        Self {
            store,
            id,
            done: AtomicBool::new(false),
            stop,
        }
    }

    /// Stop the other pump and unsubscribe. Later calls do nothing.
    async fn run(&self, end: SessionEnd) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop.send_replace(Some(end));
        if let Err(e) = self.store.unsubscribe(self.id).await {
            // Closed means the store already dropped every subscriber.
            debug!(subscriber = %self.id, error = %e, "Unsubscribe not delivered");
        }
        debug!(subscriber = %self.id, reason = end.as_str(), "WebSocket subscriber disconnected");
    }
}

async fn outbound_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut subscription: Subscription,
    teardown: &Teardown,
    mut stop: watch::Receiver<Option<SessionEnd>>,
    session: SessionConfig,
) {
    let write_timeout = session.write_timeout();
    let period = session.heartbeat_interval();
    let first_ping = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut heartbeat = tokio::time::interval_at(first_ping, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = loop {
        tokio::select! {
            biased;
            _ = stop.changed() => {
                // The inbound pump has already torn the session down.
                let owes_close = stop
                    .borrow_and_update()
                    .is_some_and(SessionEnd::owes_close_frame);
                if owes_close {
                    write_frame(&mut sink, close_frame(close_code::NORMAL, ""), write_timeout).await;
                }
                return;
            }
            message = subscription.recv() => {
                let Some(message) = message else {
                    let frame = close_frame(close_code::AWAY, "tracking stopped");
                    write_frame(&mut sink, frame, write_timeout).await;
                    break SessionEnd::QueueClosed;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize stream message");
                        continue;
                    }
                };
                if !write_frame(&mut sink, Message::Text(json.into()), write_timeout).await {
                    break SessionEnd::WriteFailed;
                }
                heartbeat.reset();
            }
            _ = heartbeat.tick() => {
                if !write_frame(&mut sink, Message::Ping(Bytes::new()), write_timeout).await {
                    break SessionEnd::WriteFailed;
                }
            }
        }
    };
    teardown.run(end).await;
}

async fn inbound_pump(
    mut stream: SplitStream<WebSocket>,
    store: &LocationStore,
    teardown: &Teardown,
    mut stop: watch::Receiver<Option<SessionEnd>>,
    idle_timeout: Duration,
) {
    let end = loop {
        tokio::select! {
            biased;
            // The outbound pump has already torn the session down.
            _ = stop.changed() => return,
            frame = tokio::time::timeout(idle_timeout, stream.next()) => match frame {
                Err(_elapsed) => break SessionEnd::IdleTimeout,
                Ok(None) => break SessionEnd::EndOfStream,
                Ok(Some(Err(e))) => {
                    debug!(error = %e, "WebSocket read error");
                    break SessionEnd::ReadError;
                }
                Ok(Some(Ok(Message::Close(_)))) => break SessionEnd::ClientClosed,
                Ok(Some(Ok(Message::Text(text)))) => ingest_frame(store, text.as_str()),
                // Pings, pongs and binary frames only prove liveness.
                Ok(Some(Ok(_))) => {}
            },
        }
    };
    teardown.run(end).await;
}

/// Ingest one inbound text frame. Bad frames are dropped without reply.
fn ingest_frame(store: &LocationStore, text: &str) {
    let report: LocationReport = match serde_json::from_str(text) {
        Ok(report) => report,
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable WebSocket frame");
            return;
        }
    };
    match store.ingest(report) {
        Ok(()) => {}
        Err(IngestError::Invalid(e)) => debug!(error = %e, "Ignoring invalid WebSocket report"),
        Err(IngestError::Store(StoreError::QueueFull)) => {
            warn!("Ingest queue full, dropping WebSocket report");
        }
        Err(IngestError::Store(e)) => debug!(error = %e, "Store not accepting WebSocket reports"),
    }
}

/// Write one frame within `limit`. Returns `false` on error or timeout.
async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    limit: Duration,
) -> bool {
    matches!(tokio::time::timeout(limit, sink.send(frame)).await, Ok(Ok(())))
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}
