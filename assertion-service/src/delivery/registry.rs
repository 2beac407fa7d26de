//! WebSocket registry keyed by `recipientId` (C8), built on top of
//! `acton_service::websocket::Broadcaster` which only indexes by
//! connection. This adds the `recipientId -> {ConnectionId}` layer the
//! domain needs for `deliverToUser`.

use std::sync::Arc;

use acton_service::websocket::{Broadcaster, ConnectionId};
use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub connection_count: usize,
}

#[derive(Clone)]
pub struct DeliveryRegistry {
    broadcaster: Broadcaster,
    by_recipient: Arc<DashMap<String, Vec<ConnectionId>>>,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self {
            broadcaster: Broadcaster::new(),
            by_recipient: Arc::new(DashMap::new()),
        }
    }

    pub async fn register(
        &self,
        recipient_id: &str,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Message>,
    ) {
        self.broadcaster.register(connection_id, sender).await;
        self.by_recipient
            .entry(recipient_id.to_string())
            .or_default()
            .push(connection_id);
    }

    pub async fn unregister(&self, recipient_id: &str, connection_id: &ConnectionId) {
        self.broadcaster.unregister(connection_id).await;
        if let Some(mut entry) = self.by_recipient.get_mut(recipient_id) {
            entry.retain(|id| id != connection_id);
        }
    }

    /// Immediate best-effort delivery; never blocks on a slow client.
    pub async fn deliver_to_user(&self, recipient_id: &str, payload: Message) -> DeliveryOutcome {
        let connections = self
            .by_recipient
            .get(recipient_id)
            .map(|c| c.clone())
            .unwrap_or_default();

        if connections.is_empty() {
            return DeliveryOutcome {
                delivered: false,
                connection_count: 0,
            };
        }

        let sent = self.broadcaster.broadcast_to(&connections, payload).await;
        DeliveryOutcome {
            delivered: sent > 0,
            connection_count: connections.len(),
        }
    }

    pub async fn close_all(&self) {
        for id in self.broadcaster.connection_ids().await {
            self.broadcaster
                .send_to(&id, Message::Close(None))
                .await;
        }
    }
}

impl Default for DeliveryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
