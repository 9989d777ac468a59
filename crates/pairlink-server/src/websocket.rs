//! WebSocket topic subscriptions
//!
//! The party that generated a pairing code connects to `/ws/topics/pair_<code>`
//! and receives the `PAIRED` notification as a JSON text frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use pairlink_messaging::is_valid_topic;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Interval between keepalive pings
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket handler for topic subscriptions
pub async fn topic_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> impl IntoResponse {
    if !is_valid_topic(&topic) {
        warn!("Topic subscription rejected: invalid topic {:?}", topic);
        return (StatusCode::BAD_REQUEST, "Invalid topic").into_response();
    }

    ws.on_upgrade(move |socket| handle_topic_socket(socket, state, topic))
        .into_response()
}

/// Forward every message published on `topic` until either side closes
pub async fn handle_topic_socket(socket: WebSocket, state: Arc<AppState>, topic: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut messages = state.topics.subscribe(&topic).await;

    info!("Subscriber connected to {}", topic);

    let mut keepalive = interval(PING_INTERVAL);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately
    keepalive.tick().await;

    loop {
        tokio::select! {
            result = messages.recv() => {
                match result {
                    Ok(message) => {
                        let json = match serde_json::to_string(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to encode message for {}: {}", topic, e);
                                continue;
                            }
                        };
                        debug!("Forwarding {} to subscriber", message.topic);
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Subscriber on {} lagged {} messages", topic, n);
                    }
                    Err(RecvError::Closed) => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("Subscriber disconnected from {}", topic);
}
