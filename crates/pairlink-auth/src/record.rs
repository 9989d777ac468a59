//! Pairing code records
//!
//! A record is created by whichever party generates the code and stored under
//! the code itself. This crate only reads it and flips `used` once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Stored state of one pairing code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRecord {
    /// Validity deadline
    pub expires_at: DateTime<Utc>,
    /// Set once the code has been redeemed; never reverts
    #[serde(default)]
    pub used: bool,
}

impl PairingRecord {
    /// Create an unused record expiring at the given instant
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at,
            used: false,
        }
    }

    /// Create an unused record valid for `ttl` from now
    pub fn expiring_in(ttl: Duration) -> Self {
        Self::new(Utc::now() + ttl)
    }

    /// Expired unless the deadline is strictly after `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
