//! Connection Session
//!
//! Lifetime of one live WebSocket subscriber:
//!
//! ```text
//! Connecting --register + snapshot--> Active --failure/close--> Closing --> Closed
//! ```
//!
//! While active, a writer loop (heartbeat pings and queued broadcasts) and a
//! reader loop (sliding read deadline) run side by side in the connection's
//! task. Either may end the session; cleanup runs once through a one-shot
//! gate no matter how many paths request it.

use std::fmt::Display;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::{ConnectionId, Partition, Subscriber, SubscriberRegistry};
use crate::config::Config;
use crate::models::{CountryEntry, LiveEvent};
use crate::store::{CollegeFilter, CollegeStore, StoreResult};

// == Session Config ==
/// Timing parameters for live sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period between liveness pings
    pub heartbeat_interval: Duration,
    /// Silence after which the peer is considered gone
    pub read_timeout: Duration,
    /// Bound on any single frame write
    pub write_timeout: Duration,
    /// Frames queued per connection before it counts as too slow
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(25),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            outbound_capacity: 64,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            outbound_capacity: config.outbound_capacity,
        }
    }
}

// == Session State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

struct SessionShared {
    subscriber: Subscriber,
    partition: Partition,
    /// Country as the client spelled it, echoed back in snapshots
    label: String,
    registry: Arc<SubscriberRegistry>,
    store: Arc<dyn CollegeStore>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    /// One-shot teardown gate
    closed: AtomicBool,
    shutdown: CancellationToken,
}

// == Session Handle ==
/// Shared view of a session, usable from any task.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

/// A session that has not started running yet.
pub struct Session {
    handle: SessionHandle,
    outbound: mpsc::Receiver<String>,
}

impl Session {
    pub fn new(
        partition: Partition,
        label: impl Into<String>,
        registry: Arc<SubscriberRegistry>,
        store: Arc<dyn CollegeStore>,
        config: SessionConfig,
    ) -> Self {
        let (tx, outbound) = mpsc::channel(config.outbound_capacity.max(1));
        let shutdown = CancellationToken::new();

        let shared = SessionShared {
            subscriber: Subscriber::new(tx, shutdown.clone()),
            partition,
            label: label.into(),
            registry,
            store,
            config,
            state: Mutex::new(SessionState::Connecting),
            closed: AtomicBool::new(false),
            shutdown,
        };

        Self {
            handle: SessionHandle {
                shared: Arc::new(shared),
            },
            outbound,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    // == Run ==
    /// Drives the session over an upgraded connection until it closes.
    ///
    /// `sink` and `stream` are the two halves of the socket. The future
    /// resolves once the session is `Closed`.
    pub async fn run<Si, St, E>(self, sink: Si, stream: St)
    where
        Si: Sink<Message>,
        Si::Error: Display,
        St: Stream<Item = Result<Message, E>>,
        E: Display,
    {
        let Session { handle, outbound } = self;
        let mut sink = Box::pin(sink);
        let stream = Box::pin(stream);

        handle.activate().await;

        if handle.send_snapshot(&mut sink).await.is_ok() {
            tokio::join!(
                handle.write_loop(&mut sink, outbound),
                handle.read_loop(stream)
            );
        }

        handle.teardown("session finished").await;

        // Release the socket: best-effort close frame, bounded like any write.
        let _ = timeout(handle.shared.config.write_timeout, sink.close()).await;
    }
}

impl SessionHandle {
    pub fn id(&self) -> ConnectionId {
        self.shared.subscriber.id()
    }

    pub fn partition(&self) -> &Partition {
        &self.shared.partition
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    fn set_state(&self, state: SessionState) {
        *self.shared.state.lock() = state;
    }

    /// Connecting -> Active: joins the registry under the session partition.
    pub async fn activate(&self) {
        let shared = &self.shared;
        shared
            .registry
            .register(shared.partition.clone(), shared.subscriber.clone())
            .await;
        self.set_state(SessionState::Active);

        info!(connection = self.id(), partition = %shared.partition, "Live session connected");
    }

    // == Teardown ==
    /// Active -> Closing -> Closed. Only the first caller performs cleanup
    /// and gets `true`; every later or concurrent call returns `false`.
    pub async fn teardown(&self, reason: &str) -> bool {
        let shared = &self.shared;
        if shared
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.set_state(SessionState::Closing);
        shared.shutdown.cancel();
        shared
            .registry
            .unregister(&shared.partition, self.id())
            .await;
        self.set_state(SessionState::Closed);

        info!(
            connection = self.id(),
            partition = %shared.partition,
            reason,
            "Live session disconnected"
        );
        true
    }

    async fn snapshot(&self) -> StoreResult<LiveEvent> {
        let shared = &self.shared;
        match &shared.partition {
            Partition::Country(_) => {
                let colleges = shared
                    .store
                    .find_many(&CollegeFilter::country(&shared.label))
                    .await?;
                Ok(LiveEvent::colleges_update(shared.label.clone(), &colleges))
            }
            Partition::Countries => {
                let names = shared.store.distinct_countries().await?;
                Ok(LiveEvent::countries_update(CountryEntry::numbered(names)))
            }
        }
    }

    /// Pushes the initial full snapshot. A store failure only skips the
    /// snapshot; a write failure ends the session.
    async fn send_snapshot<Si>(&self, sink: &mut Pin<Box<Si>>) -> Result<(), String>
    where
        Si: Sink<Message>,
        Si::Error: Display,
    {
        let event = match self.snapshot().await {
            Ok(event) => event,
            Err(e) => {
                warn!(connection = self.id(), error = %e, "Snapshot query failed");
                return Ok(());
            }
        };

        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(connection = self.id(), error = %e, "Snapshot serialization failed");
                return Ok(());
            }
        };

        if let Err(reason) = self.send(sink, Message::Text(frame)).await {
            self.teardown(&format!("snapshot write failed: {}", reason))
                .await;
            return Err(reason);
        }
        Ok(())
    }

    async fn send<Si>(&self, sink: &mut Pin<Box<Si>>, message: Message) -> Result<(), String>
    where
        Si: Sink<Message>,
        Si::Error: Display,
    {
        match timeout(self.shared.config.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("write timed out".to_string()),
        }
    }

    // == Writer ==
    /// Heartbeat pings plus queued broadcast frames.
    async fn write_loop<Si>(&self, sink: &mut Pin<Box<Si>>, mut outbound: mpsc::Receiver<String>)
    where
        Si: Sink<Message>,
        Si::Error: Display,
    {
        let period = self.shared.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shared.shutdown.cancelled() => break,
                _ = heartbeat.tick() => {
                    if let Err(reason) = self.send(sink, Message::Ping(Vec::new())).await {
                        self.teardown(&format!("heartbeat failed: {}", reason)).await;
                        break;
                    }
                    debug!(connection = self.id(), "Sent heartbeat");
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else { break };
                    if let Err(reason) = self.send(sink, Message::Text(frame)).await {
                        self.teardown(&format!("write failed: {}", reason)).await;
                        break;
                    }
                }
            }
        }
    }

    // == Reader ==
    /// Inbound frames only serve liveness; any frame, pongs included, pushes
    /// the read deadline forward.
    async fn read_loop<St, E>(&self, mut stream: Pin<Box<St>>)
    where
        St: Stream<Item = Result<Message, E>>,
        E: Display,
    {
        let read_timeout = self.shared.config.read_timeout;
        let mut last_activity = Instant::now();

        loop {
            let deadline = last_activity + read_timeout;
            tokio::select! {
                _ = self.shared.shutdown.cancelled() => break,
                next = timeout_at(deadline, stream.next()) => {
                    let reason = match next {
                        Err(_) => "read deadline expired".to_string(),
                        Ok(None) => "connection closed by peer".to_string(),
                        Ok(Some(Err(e))) => format!("read error: {}", e),
                        Ok(Some(Ok(Message::Close(_)))) => "close frame received".to_string(),
                        Ok(Some(Ok(_))) => {
                            last_activity = Instant::now();
                            continue;
                        }
                    };
                    self.teardown(&reason).await;
                    break;
                }
            }
        }
    }
}
