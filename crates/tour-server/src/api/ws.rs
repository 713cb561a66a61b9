//! WebSocket streaming of tour events.
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Handler for WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.planner().subscribe();

    // Late joiners start from the current tour rather than an empty map.
    if let Ok(snapshot) = state.planner().snapshot().await {
        if let Ok(payload) = serde_json::to_string(&serde_json::json!({
            "type": "snapshot",
            "tour": snapshot,
        })) {
            if socket.send(Message::Text(payload)).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(payload) => payload,
                            Err(err) => {
                                tracing::warn!("Failed to encode tour event: {}", err);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Later events carry full geometry/stats, so skipping is safe.
                        tracing::debug!("WebSocket subscriber lagged by {} events", missed);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}
