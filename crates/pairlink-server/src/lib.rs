//! pairlink server - Axum-based HTTP and WebSocket server
//!
//! Serves the `sendPairing` callable endpoint and lets the waiting party
//! subscribe to its notification topic over WebSocket.

pub mod http;
pub mod state;
pub mod tls;
pub mod websocket;

pub use http::create_router;
pub use state::AppState;
pub use tls::{calculate_cert_fingerprint, CertificateStore, TlsError, TlsMaterial};
pub use websocket::handle_topic_socket;
