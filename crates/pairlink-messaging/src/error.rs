//! Publish error types

use thiserror::Error;

/// Errors that can occur while publishing a message
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publisher is closed")]
    Closed,

    #[error("Message to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },
}

pub type PublishResult<T> = Result<T, PublishError>;
