//! pairlink core - shared types for the pairing redemption service
//!
//! Holds the callable wire protocol, the caller-visible error kinds and the
//! server configuration used by every other pairlink crate.

pub mod config;
pub mod error;
pub mod protocol;

pub use config::{Config, StoreBackend};
pub use error::{CallableError, ErrorKind};
pub use protocol::{
    pairing_topic, PairingEvent, PairingMessage, RedeemRequest, RedeemResponse, PAIRING_COLLECTION,
    TOPIC_PREFIX,
};
