//! Topic registry: named broadcast channels.
//!
//! A topic is either the well-known `"folders"` topic (root-index-level
//! events) or a folder id (that folder's subtree events). Each subscriber
//! is a connection's outbound frame channel; the connection's writer task
//! drains it onto the socket.

use folio_types::EntityId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// The well-known topic carrying root-index-level events.
pub const FOLDERS_TOPIC: &str = "folders";

/// A client-addressable topic: the well-known folders topic or one
/// folder's subtree.
///
/// On the wire this is a plain string, either the literal `"folders"` or
/// a folder id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Folders,
    Folder(EntityId),
}

impl Topic {
    /// The registry key for this topic.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Folders => FOLDERS_TOPIC.to_string(),
            Self::Folder(id) => id.to_string(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == FOLDERS_TOPIC {
            return Ok(Self::Folders);
        }
        EntityId::parse(&raw)
            .map(Self::Folder)
            .map_err(serde::de::Error::custom)
    }
}

/// Process-unique handle for one live connection.
pub type ConnectionId = u64;

type Subscribers = HashMap<ConnectionId, UnboundedSender<String>>;

/// Maps topic names to the set of currently connected subscribers.
///
/// Purely in-memory and connection-scoped; the durable subscription
/// records live in the entity store.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, Subscribers>>,
    next_id: AtomicU64,
}

impl TopicRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a connection id for a newly opened socket.
    pub fn register(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds a connection to a topic's subscriber set. Re-subscribing
    /// replaces the stored sender and is harmless.
    pub fn subscribe(&self, topic: &str, conn: ConnectionId, tx: UnboundedSender<String>) {
        let mut topics = self.topics.lock().expect("topic registry poisoned");
        topics.entry(topic.to_string()).or_default().insert(conn, tx);
        trace!(topic, conn, "subscribed");
    }

    /// Removes a connection from a topic's subscriber set.
    pub fn unsubscribe(&self, topic: &str, conn: ConnectionId) {
        let mut topics = self.topics.lock().expect("topic registry poisoned");
        if let Some(subs) = topics.get_mut(topic) {
            subs.remove(&conn);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
        trace!(topic, conn, "unsubscribed");
    }

    /// Removes a connection from every topic. Called on socket close.
    pub fn unsubscribe_all(&self, conn: ConnectionId) {
        let mut topics = self.topics.lock().expect("topic registry poisoned");
        topics.retain(|_, subs| {
            subs.remove(&conn);
            !subs.is_empty()
        });
    }

    /// Whether a connection is currently subscribed to a topic.
    pub fn is_subscribed(&self, topic: &str, conn: ConnectionId) -> bool {
        let topics = self.topics.lock().expect("topic registry poisoned");
        topics.get(topic).is_some_and(|subs| subs.contains_key(&conn))
    }

    /// Delivers a frame to every subscriber of `topic`. Returns the number
    /// of live subscribers reached; senders whose connection has gone away
    /// are skipped.
    pub fn publish(&self, topic: &str, frame: &str) -> usize {
        let topics = self.topics.lock().expect("topic registry poisoned");
        let Some(subs) = topics.get(topic) else {
            return 0;
        };
        let mut delivered = 0;
        for (conn, tx) in subs {
            if tx.send(frame.to_string()).is_ok() {
                delivered += 1;
            } else {
                debug!(topic, conn, "dropping frame for closed connection");
            }
        }
        delivered
    }

    /// Delivers a frame to the sender first, then to the whole topic.
    ///
    /// The sender hears its own update twice when subscribed to the topic;
    /// receivers are expected to be idempotent to duplicate delivery of
    /// the same logical update.
    pub fn broadcast(&self, sender: &UnboundedSender<String>, topic: &str, frame: &str) {
        let _ = sender.send(frame.to_string());
        self.publish(topic, frame);
    }
}
