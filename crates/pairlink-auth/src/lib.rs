//! pairlink auth - pairing code redemption
//!
//! A pairing code is generated out-of-band by the first party and stored in the
//! `pairingCodes` collection. The second party redeems it through
//! [`PairingRedeemer`], which consumes the code exactly once and notifies the
//! first party on topic `pair_<code>`.
//!
//! # Example
//!
//! ```no_run
//! use pairlink_auth::{JsonFileStore, PairingRedeemer};
//! use pairlink_core::RedeemRequest;
//! use pairlink_messaging::TopicHub;
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let store = Arc::new(JsonFileStore::new().await.unwrap());
//!     let hub = Arc::new(TopicHub::new());
//!     let redeemer = PairingRedeemer::new(store, hub.clone());
//!
//!     // First party waits on its topic
//!     let mut rx = hub.subscribe("pair_abc123").await;
//!
//!     // Second party redeems the code
//!     redeemer.redeem(RedeemRequest::flat("abc123")).await.unwrap();
//!     let event = rx.recv().await.unwrap();
//!     println!("{} -> {:?}", event.topic, event.data);
//! }
//! ```

pub mod pairing;
pub mod record;
pub mod storage;

pub use pairing::{PairingRedeemer, RedeemError, RedeemResult};
pub use record::PairingRecord;
pub use storage::{
    JsonFileStore, MarkUsed, MemoryStore, PairingStore, StorageError, StorageResult,
};
