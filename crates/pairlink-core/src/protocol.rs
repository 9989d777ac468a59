//! Callable protocol message types

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::error::CallableError;

/// Document-store collection holding pairing codes
pub const PAIRING_COLLECTION: &str = "pairingCodes";

/// Prefix of the per-code notification topic
pub const TOPIC_PREFIX: &str = "pair_";

/// Topic the first party subscribes to while waiting for its code to be redeemed
pub fn pairing_topic(pair_id: &str) -> String {
    format!("{}{}", TOPIC_PREFIX, pair_id)
}

/// Inner payload carrying the pairing identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairIdPayload {
    #[serde(rename = "pairId", default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<String>,
}

/// Accepted shapes of a redemption payload
///
/// An object may carry `pairId` at the top level, under `data`, or both. A
/// non-empty top-level value wins; otherwise the wrapped one is used. Anything
/// that is not an object of that shape lands in `Missing`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RedeemRequest {
    /// `{"pairId": "..."}` and/or `{"data": {"pairId": "..."}}`
    Fields {
        #[serde(rename = "pairId", default)]
        pair_id: Option<String>,
        #[serde(default)]
        data: Option<PairIdPayload>,
    },
    /// No recognisable identifier
    Missing(IgnoredAny),
}

impl RedeemRequest {
    pub fn flat(pair_id: impl Into<String>) -> Self {
        RedeemRequest::Fields {
            pair_id: Some(pair_id.into()),
            data: None,
        }
    }

    pub fn wrapped(pair_id: impl Into<String>) -> Self {
        RedeemRequest::Fields {
            pair_id: None,
            data: Some(PairIdPayload {
                pair_id: Some(pair_id.into()),
            }),
        }
    }

    pub fn missing() -> Self {
        RedeemRequest::Missing(IgnoredAny)
    }

    /// Normalise to a single identifier; empty strings count as absent
    pub fn into_pair_id(self) -> Option<String> {
        match self {
            RedeemRequest::Fields { pair_id, data } => pair_id
                .filter(|id| !id.is_empty())
                .or_else(|| data.and_then(|d| d.pair_id).filter(|id| !id.is_empty())),
            RedeemRequest::Missing(_) => None,
        }
    }
}

/// Request envelope: `{"data": ...}`
///
/// A body without `data`, or with `"data": null`, carries no payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CallableRequest<T> {
    pub data: Option<T>,
}

/// Acknowledgment of a successful redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub success: bool,
}

impl RedeemResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Event carried in a pairing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PairingEvent {
    /// The code was redeemed by the second party
    #[serde(rename = "PAIRED")]
    Paired,
}

/// A message addressed to one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingMessage {
    pub topic: String,
    pub data: PairingEvent,
}

impl PairingMessage {
    /// The `PAIRED` notification for a redeemed code
    pub fn paired(pair_id: &str) -> Self {
        Self {
            topic: pairing_topic(pair_id),
            data: PairingEvent::Paired,
        }
    }
}

/// Success envelope: `{"result": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableResult<T> {
    pub result: T,
}

/// Failure envelope: `{"error": {"status": ..., "message": ...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableFailure {
    pub error: CallableError,
}
