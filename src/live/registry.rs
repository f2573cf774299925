//! Subscriber Registry
//!
//! Maps a partition (a country, or the country-list feed) to the live
//! connections subscribed to it, and fans events out to them.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::cache::normalize_key;
use crate::models::LiveEvent;

/// Identity of one live connection, unique for the process lifetime.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// == Partition ==
/// Subscription scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Colleges of one country, keyed by normalized country name
    Country(String),
    /// The list of countries itself
    Countries,
}

impl Partition {
    /// Partition for a country, keyed case- and whitespace-insensitively.
    pub fn country(name: &str) -> Self {
        Partition::Country(normalize_key(name))
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Country(country) => write!(f, "country:{}", country),
            Partition::Countries => f.write_str("countries"),
        }
    }
}

// == Subscriber ==
/// Registry-side end of a connection: its outbound queue and the signal
/// that asks the owning session to tear down.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl Subscriber {
    pub fn new(outbound: mpsc::Sender<String>, shutdown: CancellationToken) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            outbound,
            shutdown,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a serialized frame. On failure the owning session is told to
    /// close; the subscriber itself stays registered until it does.
    fn deliver(&self, frame: String) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection = self.id, "Outbound queue full, closing slow subscriber");
                self.shutdown.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection = self.id, "Outbound queue closed, session is going away");
                self.shutdown.cancel();
                false
            }
        }
    }
}

// == Subscriber Registry ==
/// Partition to subscriber-set map behind a read/write lock.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    partitions: RwLock<HashMap<Partition, HashMap<ConnectionId, Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Adds `subscriber` to `partition`. Returns false if it was already
    /// registered there.
    pub async fn register(&self, partition: Partition, subscriber: Subscriber) -> bool {
        let mut partitions = self.partitions.write().await;
        let members = partitions.entry(partition.clone()).or_default();
        let added = members.insert(subscriber.id(), subscriber).is_none();

        debug!(partition = %partition, subscribers = members.len(), "Registered subscriber");
        added
    }

    // == Unregister ==
    /// Removes a connection. Returns false, without error, if it was not
    /// registered.
    pub async fn unregister(&self, partition: &Partition, id: ConnectionId) -> bool {
        let mut partitions = self.partitions.write().await;
        let Some(members) = partitions.get_mut(partition) else {
            return false;
        };

        let removed = members.remove(&id).is_some();
        if members.is_empty() {
            partitions.remove(partition);
        }
        removed
    }

    pub async fn subscriber_count(&self, partition: &Partition) -> usize {
        self.partitions
            .read()
            .await
            .get(partition)
            .map_or(0, HashMap::len)
    }

    pub async fn total_subscribers(&self) -> usize {
        self.partitions.read().await.values().map(HashMap::len).sum()
    }

    // == Broadcast ==
    /// Delivers an event to every subscriber of `partition`.
    ///
    /// `build` is only called, and the event only serialized, when the
    /// partition has subscribers. Delivery is best-effort and returns the
    /// number of queues that accepted the frame.
    pub async fn broadcast_with<F>(&self, partition: &Partition, build: F) -> usize
    where
        F: FnOnce() -> LiveEvent,
    {
        // Copy the member list so delivery runs without holding the lock.
        let subscribers: Vec<Subscriber> = {
            let partitions = self.partitions.read().await;
            match partitions.get(partition) {
                Some(members) if !members.is_empty() => members.values().cloned().collect(),
                _ => return 0,
            }
        };

        let event = build();
        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(e) => {
                error!(partition = %partition, error = %e, "Failed to serialize live event");
                return 0;
            }
        };

        let delivered = subscribers
            .iter()
            .filter(|subscriber| subscriber.deliver(frame.clone()))
            .count();

        debug!(
            partition = %partition,
            event_type = event.event_type(),
            delivered,
            subscribers = subscribers.len(),
            "Broadcast live event"
        );
        delivered
    }

    /// Like [`SubscriberRegistry::broadcast_with`] for an already-built event.
    pub async fn broadcast(&self, partition: &Partition, event: LiveEvent) -> usize {
        self.broadcast_with(partition, || event).await
    }
}
