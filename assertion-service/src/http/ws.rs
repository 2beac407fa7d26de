//! `WS /ws/notifications`: connect frame on open, notification frames
//! pushed by the outbox worker via `DeliveryRegistry`, client ping/pong,
//! and a server-initiated 30s heartbeat that reaps unresponsive sockets.

use std::time::Duration;

use acton_service::websocket::{ConnectionId, WebSocket, WebSocketUpgrade};
use axum::{extract::State, extract::ws::Message, response::IntoResponse};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::Instant;

use crate::state::AppState;
use crate::viewer::Viewer;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn ws_notifications(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    viewer: Viewer,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, viewer))
}

async fn handle_socket(socket: WebSocket, state: AppState, viewer: Viewer) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Message>(32);
    let connection_id = ConnectionId::new();

    state
        .delivery
        .register(&viewer.user_id, connection_id, tx.clone())
        .await;

    let connected = json!({
        "type": "connected",
        "userId": viewer.user_id,
        "message": "connected",
    });
    if tx
        .send(Message::Text(connected.to_string().into()))
        .await
        .is_err()
    {
        state.delivery.unregister(&viewer.user_id, &connection_id).await;
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let (last_pong_tx, last_pong_rx) = tokio::sync::watch::channel(Instant::now());

    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                        if value.get("type").and_then(|t| t.as_str()) == Some("ping") {
                            let pong = json!({"type": "pong"});
                            if recv_tx
                                .send(Message::Text(pong.to_string().into()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                }
                Message::Pong(_) => {
                    let _ = last_pong_tx.send(Instant::now());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let heartbeat_tx = tx.clone();
    let heartbeat_user_id = viewer.user_id.clone();
    let mut heartbeat_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if heartbeat_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                break;
            }
            if last_pong_rx.borrow().elapsed() > PONG_TIMEOUT {
                tracing::info!(user_id = %heartbeat_user_id, "websocket connection unresponsive, closing");
                let _ = heartbeat_tx.send(Message::Close(None)).await;
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => { recv_task.abort(); heartbeat_task.abort(); }
        _ = &mut recv_task => { send_task.abort(); heartbeat_task.abort(); }
        _ = &mut heartbeat_task => { send_task.abort(); recv_task.abort(); }
    }

    state.delivery.unregister(&viewer.user_id, &connection_id).await;
}
