//! Caller-visible error kinds for pairlink

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Distinct failure kinds a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Identifier missing after normalisation, or an unreadable payload
    InvalidArgument,
    /// No record exists for the identifier
    NotFound,
    /// The record was already redeemed
    FailedPrecondition,
    /// The record is past its expiry timestamp
    DeadlineExceeded,
    /// A collaborator (store or publisher) failed
    Internal,
}

impl ErrorKind {
    /// Status string used in the callable error envelope
    pub fn as_status(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// HTTP status code the callable protocol pairs with this kind
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidArgument | ErrorKind::FailedPrecondition => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::DeadlineExceeded => 504,
            ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_status())
    }
}

/// Structured failure returned to the caller: kind plus human-readable message
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{status}: {message}")]
pub struct CallableError {
    pub status: ErrorKind,
    pub message: String,
}

impl CallableError {
    pub fn new(status: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }
}
