//! Shared application state

use pairlink_auth::PairingRedeemer;
use pairlink_messaging::TopicHub;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    /// Redeems pairing codes
    pub redeemer: Arc<PairingRedeemer>,
    /// Topic fan-out backing the WebSocket subscriptions
    pub topics: Arc<TopicHub>,
    /// Certificate fingerprint when serving HTTPS
    pub cert_fingerprint: Option<String>,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        redeemer: Arc<PairingRedeemer>,
        topics: Arc<TopicHub>,
        cert_fingerprint: Option<String>,
    ) -> Self {
        Self {
            redeemer,
            topics,
            cert_fingerprint,
        }
    }
}
