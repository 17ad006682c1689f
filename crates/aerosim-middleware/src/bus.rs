//! Namespaced, typed, topic-based publish/subscribe transport.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the publisher or the others.
//!
//! # Topic names
//!
//! A [`TransportNode`] is scoped to a namespace and resolves the names it is
//! given before touching the shared [`TransportHub`]:
//!
//! | Given | Resolved (namespace `firefly`) |
//! |---|---|
//! | `~/connect_gazebo_to_ros_subtopic` | `/gazebo/firefly/connect_gazebo_to_ros_subtopic` |
//! | `gps` | `/gazebo/firefly/gps` |
//! | `/world/clock` | `/world/clock` |
//!
//! # Delivery
//!
//! Publishing is fire-and-forget: a topic nobody listens on simply drops the
//! message.  Latched publishes are additionally retained per topic and handed,
//! oldest first, to every subscriber that joins afterwards.  A topic keeps
//! each distinct latched message once, up to the channel capacity.

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aerosim_types::{Message, MessageKind, Payload};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Subtopic on which plugins announce the topics an external bridge should
/// mirror.  Advertise it as `~/` + this name.
pub const REGISTRATION_SUBTOPIC: &str = "connect_gazebo_to_ros_subtopic";

#[derive(Debug)]
struct TopicEntry {
    sender: broadcast::Sender<Message>,
    kind: Option<MessageKind>,
    latched: VecDeque<Message>,
    advertisements: usize,
}

/// Shared topic table.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct TransportHub {
    topics: Arc<Mutex<HashMap<String, TopicEntry>>>,
    closed: Arc<AtomicBool>,
    capacity: usize,
}

impl TransportHub {
    /// Create a new hub; `capacity` is applied to every topic channel
    /// independently.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            capacity,
        }
    }

    /// Number of times the fully-resolved `topic` has been advertised.
    pub fn advertise_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, |e| e.advertisements)
    }

    /// Record kind `topic` was first advertised with, if any.
    pub fn topic_kind(&self, topic: &str) -> Option<MessageKind> {
        self.lock().get(topic).and_then(|e| e.kind)
    }

    /// Sorted list of every advertised topic.
    pub fn advertised_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, e)| e.advertisements > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Drop every channel held by the hub.
    ///
    /// Subscribers see end-of-stream once the remaining [`Publisher`]s are
    /// dropped as well.  Subscriptions made afterwards end immediately.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lock().clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicEntry>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advertise(&self, topic: &str, kind: MessageKind) -> broadcast::Sender<Message> {
        let mut topics = self.lock();
        let entry = Self::entry(&mut topics, topic, self.capacity);
        match entry.kind {
            None => entry.kind = Some(kind),
            Some(existing) if existing != kind => {
                warn!(
                    topic,
                    advertised = ?existing,
                    requested = ?kind,
                    "topic re-advertised with a different record type; reusing channel"
                );
            }
            Some(_) => {}
        }
        entry.advertisements += 1;
        entry.sender.clone()
    }

    fn subscribe(&self, topic: &str) -> Subscriber {
        if self.is_shut_down() {
            let (_, receiver) = broadcast::channel(1);
            return Subscriber {
                topic: topic.to_string(),
                receiver,
                pending: VecDeque::new(),
            };
        }
        let mut topics = self.lock();
        let entry = Self::entry(&mut topics, topic, self.capacity);
        Subscriber {
            topic: topic.to_string(),
            receiver: entry.sender.subscribe(),
            pending: entry.latched.clone(),
        }
    }

    fn publish_latched(&self, topic: &str, message: Message) -> usize {
        let capacity = self.capacity.max(1);
        let mut topics = self.lock();
        let entry = Self::entry(&mut topics, topic, self.capacity);
        if !entry.latched.contains(&message) {
            if entry.latched.len() == capacity {
                entry.latched.pop_front();
            }
            entry.latched.push_back(message.clone());
        }
        entry.sender.send(message).unwrap_or(0)
    }

    fn entry<'a>(
        topics: &'a mut HashMap<String, TopicEntry>,
        topic: &str,
        capacity: usize,
    ) -> &'a mut TopicEntry {
        topics.entry(topic.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(capacity);
            TopicEntry {
                sender,
                kind: None,
                latched: VecDeque::new(),
                advertisements: 0,
            }
        })
    }
}

impl Default for TransportHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A handle on the hub scoped to one namespace.
#[derive(Clone, Debug)]
pub struct TransportNode {
    hub: TransportHub,
    namespace: String,
}

impl TransportNode {
    pub fn new(hub: TransportHub, namespace: impl Into<String>) -> Self {
        Self {
            hub,
            namespace: namespace.into().trim_matches('/').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn hub(&self) -> &TransportHub {
        &self.hub
    }

    /// Resolve `topic` against this node's namespace (see the module docs).
    pub fn resolve(&self, topic: &str) -> String {
        let prefix = if self.namespace.is_empty() {
            "/gazebo".to_string()
        } else {
            format!("/gazebo/{}", self.namespace)
        };

        if let Some(rest) = topic.strip_prefix('~') {
            format!("{prefix}{rest}")
        } else if topic.starts_with('/') {
            topic.to_string()
        } else {
            format!("{prefix}/{topic}")
        }
    }

    /// Open (or reuse) `topic` for publishing records of type `T`.
    pub fn advertise<T: Payload>(&self, topic: &str) -> Publisher<T> {
        let resolved = self.resolve(topic);
        let sender = self.hub.advertise(&resolved, T::KIND);
        Publisher {
            topic: resolved,
            sender,
            hub: self.hub.clone(),
            _record: PhantomData,
        }
    }

    /// Subscribe to `topic`.  The topic does not have to be advertised yet.
    pub fn subscribe(&self, topic: &str) -> Subscriber {
        self.hub.subscribe(&self.resolve(topic))
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Typed outbound handle returned by [`TransportNode::advertise`].
pub struct Publisher<T> {
    topic: String,
    sender: broadcast::Sender<Message>,
    hub: TransportHub,
    _record: PhantomData<fn(T)>,
}

impl<T: Payload> Publisher<T> {
    /// Fully-resolved topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a copy of `record`.
    ///
    /// Returns the number of subscribers that were handed the record; `0`
    /// when nobody is listening (a normal condition, not an error).
    pub fn publish(&self, record: &T) -> usize {
        let delivered = self.sender.send(record.clone().into_message()).unwrap_or(0);
        trace!(topic = %self.topic, delivered, "published");
        delivered
    }

    /// Publish a copy of `record` and retain it for late subscribers.
    pub fn publish_latched(&self, record: &T) -> usize {
        let delivered = self
            .hub
            .publish_latched(&self.topic, record.clone().into_message());
        trace!(topic = %self.topic, delivered, "published (latched)");
        delivered
    }

    /// Number of subscribers currently attached to the topic.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// A receiver bound to a single resolved topic.
pub struct Subscriber {
    topic: String,
    receiver: broadcast::Receiver<Message>,
    pending: VecDeque<Message>,
}

impl Subscriber {
    /// Fully-resolved topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message on this topic, starting with the messages
    /// the topic had latched when the subscription was made.
    ///
    /// Returns `None` once the topic has been shut down and every publisher
    /// dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        if let Some(latched) = self.pending.pop_front() {
            return Some(latched);
        }
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Subscriber fell behind; log and continue.
                    warn!(topic = %self.topic, lagged_by = n, "subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv]; `None` when nothing is
    /// queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        if let Some(latched) = self.pending.pop_front() {
            return Some(latched);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "subscriber lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
