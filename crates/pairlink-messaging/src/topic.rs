//! In-process topic fan-out
//!
//! Each topic owns a broadcast channel created on first subscription. Publishing
//! to a topic nobody listens on is accepted and dropped, matching how push
//! services acknowledge topic sends.

use crate::error::{PublishError, PublishResult};
use crate::MessagePublisher;
use async_trait::async_trait;
use pairlink_core::PairingMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// Default number of messages buffered per topic
pub const DEFAULT_TOPIC_CAPACITY: usize = 16;

/// Longest topic name accepted
const MAX_TOPIC_LEN: usize = 900;

/// Topic names are limited to `[A-Za-z0-9-_.~%]`, 1 to 900 characters
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic.len() <= MAX_TOPIC_LEN
        && topic
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'))
}

/// Broadcast hub keyed by topic name
pub struct TopicHub {
    channels: RwLock<HashMap<String, broadcast::Sender<PairingMessage>>>,
    capacity: usize,
    closed: AtomicBool,
}

impl Default for TopicHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicHub {
    /// Create a hub with the default per-topic buffer
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a hub buffering `capacity` messages per topic
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe to a topic, creating its channel if needed
    ///
    /// After [`TopicHub::close`] the returned receiver is already closed.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<PairingMessage> {
        if self.is_closed() {
            let (_tx, rx) = broadcast::channel(1);
            return rx;
        }

        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        debug!("New subscriber on topic {}", topic);
        tx.subscribe()
    }

    /// Number of live subscribers on a topic
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(topic).map_or(0, |tx| tx.receiver_count())
    }

    /// Number of topics with a channel
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Stop accepting messages and disconnect every subscriber
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut channels = self.channels.write().await;
        let count = channels.len();
        channels.clear();
        info!("Topic hub closed ({} topics dropped)", count);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagePublisher for TopicHub {
    async fn publish(&self, message: &PairingMessage) -> PublishResult<()> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        if !is_valid_topic(&message.topic) {
            return Err(PublishError::Rejected {
                topic: message.topic.clone(),
                reason: "invalid topic name".to_string(),
            });
        }

        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);

        match channels.get(&message.topic) {
            Some(tx) => {
                let delivered = tx.send(message.clone()).unwrap_or(0);
                debug!("Published to {} ({} subscribers)", message.topic, delivered);
            }
            None => debug!("Published to {} (no subscribers)", message.topic),
        }

        Ok(())
    }
}
