//! HTTP request handlers
//!
//! Exposes the redemption endpoint using the callable-function envelope:
//! requests carry `{"data": ...}`, successes answer `{"result": ...}` and
//! failures answer `{"error": {"status", "message"}}`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pairlink_core::protocol::{CallableFailure, CallableRequest, CallableResult};
use pairlink_core::{CallableError, RedeemRequest};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Callable endpoint
        .route("/sendPairing", post(send_pairing_handler))
        // Topic subscriptions
        .route("/ws/topics/:topic", get(crate::websocket::topic_ws_handler))
        // Server info
        .route("/api/info", get(server_info_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Pairing
// ============================================================================

/// Redeem a pairing code and notify the waiting party
async fn send_pairing_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallableRequest<RedeemRequest>>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(envelope)) => envelope.data.unwrap_or_else(RedeemRequest::missing),
        Err(rejection) => {
            debug!("Unreadable redemption payload: {}", rejection.body_text());
            return callable_error(CallableError::invalid_argument(
                "Request body must be a JSON object",
            ));
        }
    };

    match state.redeemer.redeem(request).await {
        Ok(response) => (StatusCode::OK, Json(CallableResult { result: response })).into_response(),
        Err(e) => callable_error(CallableError::from(&e)),
    }
}

/// Render a failure with the HTTP status its kind maps to
fn callable_error(error: CallableError) -> Response {
    let status = StatusCode::from_u16(error.status.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(CallableFailure { error })).into_response()
}

// ============================================================================
// Server Info
// ============================================================================

/// Server information response
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Server version
    pub version: String,
    /// Topics with at least one channel open
    pub open_topics: usize,
    /// Certificate fingerprint (for verification)
    pub cert_fingerprint: Option<String>,
}

/// Get server information
async fn server_info_handler(State(state): State<Arc<AppState>>) -> Json<ServerInfo> {
    Json(ServerInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        open_topics: state.topics.topic_count().await,
        cert_fingerprint: state.cert_fingerprint.clone(),
    })
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health_handler() -> Json<Health> {
    Json(Health { status: "ok" })
}
