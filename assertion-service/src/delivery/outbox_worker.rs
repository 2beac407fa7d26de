//! Outbox worker (C8): a 5s-tick loop that drains pending
//! `notification_outbox` rows per adapter with exponential backoff.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;

use crate::delivery::registry::DeliveryRegistry;
use crate::notify::{
    backoff_delay, notification_frame, Adapter, NotificationRepository, OutboxRepository,
    ENABLED_ADAPTERS, MAX_OUTBOX_ATTEMPTS,
};

const TICK: StdDuration = StdDuration::from_secs(5);
const BATCH_SIZE: u32 = 50;

/// One iteration of the outbox drain, factored out of the loop so it can
/// be driven directly in tests without waiting on a timer.
pub async fn drain_once<N, O>(notifications: &N, outbox: &O, registry: &DeliveryRegistry)
where
    N: NotificationRepository,
    O: OutboxRepository,
{
    for adapter in ENABLED_ADAPTERS {
        let rows = match outbox.fetch_due(adapter, BATCH_SIZE).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(adapter = ?adapter, error = %e, "failed to fetch due outbox rows");
                continue;
            }
        };

        for row in rows {
            let notification = match notifications.get_by_id(&row.notification_id).await {
                Ok(Some(n)) => n,
                Ok(None) => {
                    // Dangling: the notification's target assertion may have
                    // been deleted. The read API tolerates this; here we
                    // simply give up on delivering it further.
                    if let Err(e) = outbox.mark_failed(&row.id, "notification missing").await {
                        tracing::error!(error = %e, "failed to mark dangling outbox row failed");
                    }
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to load notification for outbox row");
                    continue;
                }
            };

            let delivery_result = match adapter {
                Adapter::Websocket => {
                    let outcome = registry
                        .deliver_to_user(&notification.recipient_id, notification_frame(&notification))
                        .await;
                    if outcome.delivered {
                        Ok(())
                    } else {
                        Err("recipient has no active connection".to_string())
                    }
                }
                Adapter::Push => {
                    // Push transport is an out-of-scope external
                    // collaborator (see DESIGN.md); the outbox lifecycle
                    // still runs so the at-least-once contract holds.
                    Err("push transport not configured".to_string())
                }
            };

            match delivery_result {
                Ok(()) => {
                    if let Err(e) = outbox.mark_delivered(&row.id).await {
                        tracing::error!(error = %e, "failed to mark outbox row delivered");
                    }
                }
                Err(reason) => {
                    let attempts = row.attempts + 1;
                    if attempts >= MAX_OUTBOX_ATTEMPTS {
                        if let Err(e) = outbox.mark_failed(&row.id, &reason).await {
                            tracing::error!(error = %e, "failed to mark outbox row failed");
                        }
                    } else {
                        let next_attempt_at = Utc::now() + backoff_delay(attempts);
                        if let Err(e) = outbox
                            .mark_retry(&row.id, attempts, next_attempt_at, &reason)
                            .await
                        {
                            tracing::error!(error = %e, "failed to reschedule outbox row");
                        }
                    }
                }
            }
        }
    }
}

/// Runs the drain loop until `stop` fires. Spawned with `tokio::spawn` in
/// `main.rs` and torn down by sending on `stop` during graceful shutdown.
pub async fn run<N, O>(
    notifications: Arc<N>,
    outbox: Arc<O>,
    registry: DeliveryRegistry,
    mut stop: tokio::sync::mpsc::Receiver<()>,
) where
    N: NotificationRepository + 'static,
    O: OutboxRepository + 'static,
{
    let mut interval = tokio::time::interval(TICK);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                drain_once(notifications.as_ref(), outbox.as_ref(), &registry).await;
            }
            _ = stop.recv() => {
                tracing::info!("outbox worker received stop signal");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::ReactionType;
    use crate::notify::NotificationType;
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNotifications {
        rows: Mutex<Vec<crate::notify::Notification>>,
    }

    impl NotificationRepository for FakeNotifications {
        async fn insert_if_absent(
            &self,
            recipient_id: &str,
            actor_id: &str,
            assertion_id: &str,
            notification_type: NotificationType,
            reaction_type: Option<ReactionType>,
        ) -> crate::error::AppResult<Option<crate::notify::Notification>> {
            let n = crate::notify::Notification {
                id: "n1".into(),
                recipient_id: recipient_id.into(),
                actor_id: actor_id.into(),
                assertion_id: assertion_id.into(),
                notification_type,
                reaction_type,
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(n.clone());
            Ok(Some(n))
        }

        async fn get_by_id(
            &self,
            notification_id: &str,
        ) -> crate::error::AppResult<Option<crate::notify::Notification>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|n| n.id == notification_id)
                .cloned())
        }
    }

    #[derive(Default)]
    struct FakeOutbox {
        rows: Mutex<Vec<crate::notify::OutboxRow>>,
        delivered: Mutex<Vec<String>>,
        retried: Mutex<Vec<(String, u32)>>,
        failed: Mutex<Vec<String>>,
    }

    impl OutboxRepository for FakeOutbox {
        async fn enqueue(&self, _notification_id: &str, _adapter: Adapter) -> crate::error::AppResult<()> {
            Ok(())
        }

        async fn fetch_due(&self, adapter: Adapter, _limit: u32) -> crate::error::AppResult<Vec<crate::notify::OutboxRow>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.adapter == adapter)
                .cloned()
                .collect())
        }

        async fn mark_delivered(&self, id: &str) -> crate::error::AppResult<()> {
            self.delivered.lock().unwrap().push(id.to_string());
            self.rows.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }

        async fn mark_retry(
            &self,
            id: &str,
            attempts: u32,
            _next_attempt_at: chrono::DateTime<Utc>,
            _last_error: &str,
        ) -> crate::error::AppResult<()> {
            self.retried.lock().unwrap().push((id.to_string(), attempts));
            Ok(())
        }

        async fn mark_failed(&self, id: &str, _last_error: &str) -> crate::error::AppResult<()> {
            self.failed.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn websocket_row_without_connection_retries() {
        let notifications = FakeNotifications::default();
        notifications
            .insert_if_absent("recipient", "actor", "asn_1", NotificationType::Reply, None)
            .await
            .unwrap();

        let outbox = FakeOutbox::default();
        outbox.rows.lock().unwrap().push(crate::notify::OutboxRow {
            id: "row1".into(),
            notification_id: "n1".into(),
            adapter: Adapter::Websocket,
            attempts: 0,
            next_attempt_at: Utc::now(),
        });

        let registry = DeliveryRegistry::new();
        drain_once(&notifications, &outbox, &registry).await;

        assert_eq!(outbox.retried.lock().unwrap().len(), 1);
        assert!(outbox.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn row_at_attempt_cap_fails() {
        let notifications = FakeNotifications::default();
        notifications
            .insert_if_absent("recipient", "actor", "asn_1", NotificationType::Reply, None)
            .await
            .unwrap();

        let outbox = FakeOutbox::default();
        outbox.rows.lock().unwrap().push(crate::notify::OutboxRow {
            id: "row1".into(),
            notification_id: "n1".into(),
            adapter: Adapter::Websocket,
            attempts: MAX_OUTBOX_ATTEMPTS - 1,
            next_attempt_at: Utc::now() - Duration::seconds(1),
        });

        let registry = DeliveryRegistry::new();
        drain_once(&notifications, &outbox, &registry).await;

        assert_eq!(outbox.failed.lock().unwrap().len(), 1);
    }
}
