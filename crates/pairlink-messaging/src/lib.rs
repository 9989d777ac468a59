//! pairlink messaging
//!
//! Publishes pairing notifications to named topics:
//!
//! - **MessagePublisher**: the seam the redeemer sends through. Any push
//!   service client can sit behind it.
//!
//! - **TopicHub**: in-process fan-out over `tokio::sync::broadcast`, one
//!   channel per topic, used by the bundled server to stream notifications to
//!   WebSocket subscribers.

mod error;
mod topic;

pub use error::{PublishError, PublishResult};
pub use topic::{is_valid_topic, TopicHub, DEFAULT_TOPIC_CAPACITY};

use async_trait::async_trait;
use pairlink_core::PairingMessage;

/// Sends a message to the topic named in it
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one message; succeeds once the message has been accepted
    async fn publish(&self, message: &PairingMessage) -> PublishResult<()>;
}
