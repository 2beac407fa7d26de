//! Notification Pipeline (C7): derives reply/reaction signals from graph
//! writes, persists them idempotently, and enqueues one outbox row per
//! enabled delivery adapter.

use std::future::Future;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::delivery::registry::DeliveryRegistry;
use crate::error::AppResult;
use crate::graph::model::ReactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Reply,
    Reaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Adapter {
    Websocket,
    Push,
}

pub const ENABLED_ADAPTERS: [Adapter; 2] = [Adapter::Websocket, Adapter::Push];

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: String,
    pub assertion_id: String,
    pub notification_type: NotificationType,
    pub reaction_type: Option<ReactionType>,
    pub created_at: DateTime<Utc>,
}

pub trait NotificationRepository: Send + Sync {
    /// Inserts `ON CONFLICT DO NOTHING` on
    /// `(actorId, assertionId, notificationType, coalesce(reactionType,''))`.
    /// Returns the inserted notification, or `None` if it already existed.
    fn insert_if_absent(
        &self,
        recipient_id: &str,
        actor_id: &str,
        assertion_id: &str,
        notification_type: NotificationType,
        reaction_type: Option<ReactionType>,
    ) -> impl Future<Output = AppResult<Option<Notification>>> + Send;

    fn get_by_id(
        &self,
        notification_id: &str,
    ) -> impl Future<Output = AppResult<Option<Notification>>> + Send;
}

#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: String,
    pub notification_id: String,
    pub adapter: Adapter,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
}

pub trait OutboxRepository: Send + Sync {
    fn enqueue(
        &self,
        notification_id: &str,
        adapter: Adapter,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn fetch_due(
        &self,
        adapter: Adapter,
        limit: u32,
    ) -> impl Future<Output = AppResult<Vec<OutboxRow>>> + Send;

    fn mark_delivered(&self, id: &str) -> impl Future<Output = AppResult<()>> + Send;

    fn mark_retry(
        &self,
        id: &str,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn mark_failed(&self, id: &str, last_error: &str) -> impl Future<Output = AppResult<()>> + Send;
}

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PgNotificationRepository {
    async fn insert_if_absent(
        &self,
        recipient_id: &str,
        actor_id: &str,
        assertion_id: &str,
        notification_type: NotificationType,
        reaction_type: Option<ReactionType>,
    ) -> AppResult<Option<Notification>> {
        let id = Uuid::now_v7().to_string();
        let type_str = match notification_type {
            NotificationType::Reply => "reply",
            NotificationType::Reaction => "reaction",
        };
        let reaction_str = reaction_type.map(|t| match t {
            ReactionType::Like => "like",
            ReactionType::Acknowledge => "acknowledge",
        });

        let row: Option<(String,)> = sqlx::query_as(
            "INSERT INTO notifications \
                (id, recipient_id, actor_id, assertion_id, notification_type, reaction_type, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, false, now()) \
             ON CONFLICT (actor_id, assertion_id, notification_type, coalesce(reaction_type, '')) \
             DO NOTHING \
             RETURNING id",
        )
        .bind(&id)
        .bind(recipient_id)
        .bind(actor_id)
        .bind(assertion_id)
        .bind(type_str)
        .bind(reaction_str)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|_| Notification {
            id,
            recipient_id: recipient_id.to_string(),
            actor_id: actor_id.to_string(),
            assertion_id: assertion_id.to_string(),
            notification_type,
            reaction_type,
            created_at: Utc::now(),
        }))
    }

    async fn get_by_id(&self, notification_id: &str) -> AppResult<Option<Notification>> {
        let row: Option<(String, String, String, String, String, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, recipient_id, actor_id, assertion_id, notification_type, reaction_type, created_at \
                 FROM notifications WHERE id = $1",
            )
            .bind(notification_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(id, recipient_id, actor_id, assertion_id, type_str, reaction_str, created_at)| Notification {
                id,
                recipient_id,
                actor_id,
                assertion_id,
                notification_type: if type_str == "reply" {
                    NotificationType::Reply
                } else {
                    NotificationType::Reaction
                },
                reaction_type: reaction_str.and_then(|s| ReactionType::parse(&s)),
                created_at,
            },
        ))
    }
}

pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn adapter_str(adapter: Adapter) -> &'static str {
    match adapter {
        Adapter::Websocket => "websocket",
        Adapter::Push => "push",
    }
}

impl OutboxRepository for PgOutboxRepository {
    async fn enqueue(&self, notification_id: &str, adapter: Adapter) -> AppResult<()> {
        let id = Uuid::now_v7().to_string();
        sqlx::query(
            "INSERT INTO notification_outbox \
                (id, notification_id, adapter, status, attempts, next_attempt_at, created_at) \
             VALUES ($1, $2, $3, 'pending', 0, now(), now()) \
             ON CONFLICT (notification_id, adapter) DO NOTHING",
        )
        .bind(id)
        .bind(notification_id)
        .bind(adapter_str(adapter))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_due(&self, adapter: Adapter, limit: u32) -> AppResult<Vec<OutboxRow>> {
        let rows: Vec<(String, String, i32)> = sqlx::query_as(
            "SELECT id, notification_id, attempts FROM notification_outbox \
             WHERE adapter = $1 AND status = 'pending' AND next_attempt_at <= now() \
             ORDER BY next_attempt_at ASC LIMIT $2",
        )
        .bind(adapter_str(adapter))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, notification_id, attempts)| OutboxRow {
                id,
                notification_id,
                adapter,
                attempts: attempts as u32,
                next_attempt_at: Utc::now(),
            })
            .collect())
    }

    async fn mark_delivered(&self, id: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE notification_outbox SET status = 'delivered', attempts = attempts + 1, \
             delivered_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: &str,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE notification_outbox SET attempts = $2, next_attempt_at = $3, last_error = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(attempts as i32)
        .bind(next_attempt_at)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: &str, last_error: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE notification_outbox SET status = 'failed', last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl PgOutboxRepository {
    /// Deletes terminal (delivered/failed) rows older than `older_than_hours`.
    pub async fn cleanup_terminal(&self, older_than_hours: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notification_outbox \
             WHERE status IN ('delivered', 'failed') \
             AND created_at <= now() - ($1 || ' hours')::interval",
        )
        .bind(older_than_hours.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Builds the websocket frame for a notification. Shared by the immediate
/// delivery attempt in `notify_reply`/`notify_reaction` and the outbox
/// drain loop, so a recipient never sees two different shapes for the
/// same notification.
pub fn notification_frame(notification: &Notification) -> Message {
    let payload = json!({
        "type": "notification",
        "notificationId": notification.id,
        "payload": {
            "type": notification.notification_type,
            "actorId": notification.actor_id,
            "assertionId": notification.assertion_id,
            "reactionType": notification.reaction_type,
            "createdAt": notification.created_at,
        }
    });
    Message::Text(payload.to_string().into())
}

/// Computes the next retry delay for outbox attempt number `attempts`
/// (0-indexed, the attempt about to be made): `60s * 2^attempts`.
pub fn backoff_delay(attempts: u32) -> chrono::Duration {
    chrono::Duration::seconds(60 * 2i64.pow(attempts))
}

pub const MAX_OUTBOX_ATTEMPTS: u32 = 5;

/// Called after a response assertion is published. Skips self-replies.
/// Attempts immediate websocket delivery before falling back to the
/// outbox, which still enqueues so a missed immediate attempt retries.
pub async fn notify_reply<N: NotificationRepository, O: OutboxRepository>(
    notifications: &N,
    outbox: &O,
    registry: &DeliveryRegistry,
    parent_author_id: &str,
    actor_id: &str,
    reply_assertion_id: &str,
) -> AppResult<Option<Notification>> {
    if parent_author_id == actor_id {
        return Ok(None);
    }

    let notification = notifications
        .insert_if_absent(
            parent_author_id,
            actor_id,
            reply_assertion_id,
            NotificationType::Reply,
            None,
        )
        .await?;

    if let Some(notification) = &notification {
        registry
            .deliver_to_user(&notification.recipient_id, notification_frame(notification))
            .await;
        for adapter in ENABLED_ADAPTERS {
            outbox.enqueue(&notification.id, adapter).await?;
        }
    }

    Ok(notification)
}

/// Called after a reaction is added. Skips self-reactions. Same
/// immediate-delivery-then-outbox shape as `notify_reply`.
pub async fn notify_reaction<N: NotificationRepository, O: OutboxRepository>(
    notifications: &N,
    outbox: &O,
    registry: &DeliveryRegistry,
    assertion_author_id: &str,
    actor_id: &str,
    assertion_id: &str,
    reaction_type: ReactionType,
) -> AppResult<Option<Notification>> {
    if assertion_author_id == actor_id {
        return Ok(None);
    }

    let notification = notifications
        .insert_if_absent(
            assertion_author_id,
            actor_id,
            assertion_id,
            NotificationType::Reaction,
            Some(reaction_type),
        )
        .await?;

    if let Some(notification) = &notification {
        registry
            .deliver_to_user(&notification.recipient_id, notification_frame(notification))
            .await;
        for adapter in ENABLED_ADAPTERS {
            outbox.enqueue(&notification.id, adapter).await?;
        }
    }

    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNotificationRepo {
        seen: Mutex<std::collections::HashSet<(String, String, String, String)>>,
        inserted: Mutex<Vec<Notification>>,
    }

    impl NotificationRepository for FakeNotificationRepo {
        async fn insert_if_absent(
            &self,
            recipient_id: &str,
            actor_id: &str,
            assertion_id: &str,
            notification_type: NotificationType,
            reaction_type: Option<ReactionType>,
        ) -> AppResult<Option<Notification>> {
            let key = (
                actor_id.to_string(),
                assertion_id.to_string(),
                format!("{notification_type:?}"),
                reaction_type.map(|t| format!("{t:?}")).unwrap_or_default(),
            );
            let mut seen = self.seen.lock().unwrap();
            if !seen.insert(key) {
                return Ok(None);
            }
            let notification = Notification {
                id: Uuid::new_v4().to_string(),
                recipient_id: recipient_id.to_string(),
                actor_id: actor_id.to_string(),
                assertion_id: assertion_id.to_string(),
                notification_type,
                reaction_type,
                created_at: Utc::now(),
            };
            self.inserted.lock().unwrap().push(notification.clone());
            Ok(Some(notification))
        }

        async fn get_by_id(&self, notification_id: &str) -> AppResult<Option<Notification>> {
            Ok(self
                .inserted
                .lock()
                .unwrap()
                .iter()
                .find(|n| n.id == notification_id)
                .cloned())
        }
    }

    #[derive(Default)]
    struct FakeOutboxRepo {
        rows: Mutex<Vec<(String, Adapter)>>,
    }

    impl OutboxRepository for FakeOutboxRepo {
        async fn enqueue(&self, notification_id: &str, adapter: Adapter) -> AppResult<()> {
            self.rows
                .lock()
                .unwrap()
                .push((notification_id.to_string(), adapter));
            Ok(())
        }

        async fn fetch_due(&self, _adapter: Adapter, _limit: u32) -> AppResult<Vec<OutboxRow>> {
            Ok(vec![])
        }

        async fn mark_delivered(&self, _id: &str) -> AppResult<()> {
            Ok(())
        }

        async fn mark_retry(
            &self,
            _id: &str,
            _attempts: u32,
            _next_attempt_at: DateTime<Utc>,
            _last_error: &str,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn mark_failed(&self, _id: &str, _last_error: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn self_reply_is_skipped() {
        let notifications = FakeNotificationRepo::default();
        let outbox = FakeOutboxRepo::default();
        let registry = DeliveryRegistry::new();
        let result = notify_reply(&notifications, &outbox, &registry, "u1", "u1", "asn_1")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn reply_enqueues_one_row_per_adapter() {
        let notifications = FakeNotificationRepo::default();
        let outbox = FakeOutboxRepo::default();
        let registry = DeliveryRegistry::new();
        notify_reply(&notifications, &outbox, &registry, "author", "actor", "asn_1")
            .await
            .unwrap()
            .expect("notification should be created");
        assert_eq!(outbox.rows.lock().unwrap().len(), ENABLED_ADAPTERS.len());
    }

    #[tokio::test]
    async fn repeated_derivation_inserts_once() {
        let notifications = FakeNotificationRepo::default();
        let outbox = FakeOutboxRepo::default();
        let registry = DeliveryRegistry::new();
        for _ in 0..3 {
            notify_reaction(
                &notifications,
                &outbox,
                &registry,
                "author",
                "actor",
                "asn_1",
                ReactionType::Like,
            )
            .await
            .unwrap();
        }
        assert_eq!(notifications.inserted.lock().unwrap().len(), 1);
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(0), chrono::Duration::seconds(60));
        assert_eq!(backoff_delay(1), chrono::Duration::seconds(120));
        assert_eq!(backoff_delay(2), chrono::Duration::seconds(240));
    }
}
