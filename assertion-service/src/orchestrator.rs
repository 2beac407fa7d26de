//! Publish Orchestrator (C5): wires CSO validation, revision authorization,
//! the idempotency state machine, and the graph write into the single
//! pipeline described in the data model's control-flow section.

use std::sync::Arc;

use serde::Serialize;

use crate::cso::Cso;
use crate::delivery::DeliveryRegistry;
use crate::error::{AppError, AppResult};
use crate::graph::model::RevisionMetadata;
use crate::graph::GraphStore;
use crate::idempotency::{self, IdempotencyStore};
use crate::notify::{notify_reply, NotificationRepository, OutboxRepository};
use crate::viewer::{Role, Viewer};

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub assertion_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replayed: bool,
}

pub struct PublishRequest {
    pub cso: Cso,
    pub supersedes_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub clear_draft: bool,
}

/// Draft storage is an external collaborator (spec.md §1); only the
/// `deleteDraft(userId)` interface it exposes is consumed here.
pub trait DraftStore: Send + Sync {
    fn delete_draft(&self, user_id: &str) -> impl std::future::Future<Output = AppResult<()>> + Send;
}

pub async fn publish<G, I, N, O, D>(
    graph: Arc<G>,
    idempotency_store: Arc<I>,
    notifications: Arc<N>,
    outbox: Arc<O>,
    drafts: Arc<D>,
    delivery: DeliveryRegistry,
    viewer: &Viewer,
    request: PublishRequest,
) -> AppResult<PublishResponse>
where
    G: GraphStore + 'static,
    I: IdempotencyStore + 'static,
    N: NotificationRepository + 'static,
    O: OutboxRepository + 'static,
    D: DraftStore + 'static,
{
    // 1. Idempotency check.
    if let Some(key) = &request.idempotency_key {
        if let Some(record) = idempotency_store.get_by_key(key, &viewer.user_id).await? {
            match record.status {
                crate::idempotency::IdempotencyStatus::Complete => {
                    let assertion_id = record.assertion_id.clone().ok_or_else(|| {
                        AppError::Internal("complete idempotency record missing assertionId".into())
                    })?;
                    return Ok(PublishResponse {
                        assertion_id,
                        created_at: record.created_at,
                        replayed: true,
                    });
                }
                crate::idempotency::IdempotencyStatus::Pending => {
                    let reconciled = idempotency::reconcile_pending(
                        idempotency_store.as_ref(),
                        graph.as_ref(),
                        &record,
                    )
                    .await?;
                    return match reconciled {
                        Some(published) => Ok(PublishResponse {
                            assertion_id: published.assertion_id,
                            created_at: published.created_at,
                            replayed: true,
                        }),
                        None => Err(AppError::Idempotency(
                            "publish is still pending; retry shortly".into(),
                        )),
                    };
                }
            }
        }
        idempotency_store.create_pending(key, &viewer.user_id).await?;
    }

    // 2. Validation.
    let report = request.cso.validate();
    if !report.ok {
        return Err(AppError::Validation(format!("{:?}", report.errors)));
    }

    // 3. Revision authorization.
    let revision_metadata = if let Some(supersedes_id) = &request.supersedes_id {
        let original = graph
            .get_assertion_for_revision(supersedes_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("assertion {supersedes_id} not found")))?;

        if original.supersedes_id.is_some() {
            return Err(AppError::Conflict(
                "assertion has already been revised or deleted.".into(),
            ));
        }

        let may_revise = viewer.role.may_revise_any() || original.author_id == viewer.user_id;
        if !may_revise {
            return Err(AppError::Forbidden(
                "only the author or an administrator may revise this assertion".into(),
            ));
        }

        Some(RevisionMetadata {
            revision_number: 1,
            root_assertion_id: supersedes_id.clone(),
        })
    } else {
        None
    };

    // 4. Graph write.
    let published = graph
        .publish(
            viewer,
            &request.cso,
            request.supersedes_id.as_deref(),
            revision_metadata.as_ref(),
        )
        .await?;

    // 5. Post-write, dispatched to a background task: the response below
    // returns as soon as the graph write lands, and the reply notification,
    // draft clear, and idempotency completion run without the caller
    // waiting on them. Failures inside the task are logged and swallowed.
    let parent_ref = if request.cso.assertion_type == crate::cso::AssertionType::Response {
        request.cso.refs.first().map(|r| r.uri.clone())
    } else {
        None
    };
    let viewer_id = viewer.user_id.clone();
    let assertion_id = published.assertion_id.clone();
    let clear_draft = request.clear_draft;
    let idempotency_key = request.idempotency_key.clone();

    tokio::spawn(async move {
        if let Some(parent_uri) = parent_ref {
            match graph.get_assertion_for_revision(&parent_uri).await {
                Ok(Some(parent)) => {
                    if let Err(e) = notify_reply(
                        notifications.as_ref(),
                        outbox.as_ref(),
                        &delivery,
                        &parent.author_id,
                        &viewer_id,
                        &assertion_id,
                    )
                    .await
                    {
                        tracing::warn!(near_miss = true, error = %e, "failed to derive reply notification");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(near_miss = true, error = %e, "failed to load parent assertion for reply notification");
                }
            }
        }

        if clear_draft {
            if let Err(e) = drafts.delete_draft(&viewer_id).await {
                tracing::warn!(near_miss = true, error = %e, "failed to clear composer draft");
            }
        }

        if let Some(key) = &idempotency_key {
            if let Err(e) = idempotency_store
                .complete(key, &viewer_id, &assertion_id)
                .await
            {
                tracing::warn!(near_miss = true, error = %e, "failed to complete idempotency record");
            }
        }
    });

    Ok(PublishResponse {
        assertion_id: published.assertion_id,
        created_at: published.created_at,
        replayed: false,
    })
}

#[allow(dead_code)]
fn default_role_is_user(role: Role) -> bool {
    role == Role::User
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cso::{AssertionRef, AssertionType, Cso, Visibility};
    use crate::graph::fake::FakeGraphStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeIdempotency {
        records: Mutex<Vec<crate::idempotency::IdempotencyRecord>>,
    }

    impl IdempotencyStore for FakeIdempotency {
        async fn get_by_key(
            &self,
            key: &str,
            user_id: &str,
        ) -> AppResult<Option<crate::idempotency::IdempotencyRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.idempotency_key == key && r.user_id == user_id)
                .cloned())
        }

        async fn create_pending(&self, key: &str, user_id: &str) -> AppResult<()> {
            self.records.lock().unwrap().push(crate::idempotency::IdempotencyRecord {
                idempotency_key: key.to_string(),
                user_id: user_id.to_string(),
                assertion_id: None,
                status: crate::idempotency::IdempotencyStatus::Pending,
                created_at: chrono::Utc::now(),
                expires_at: chrono::Utc::now() + chrono::Duration::hours(24),
            });
            Ok(())
        }

        async fn complete(&self, key: &str, user_id: &str, assertion_id: &str) -> AppResult<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(r) = records.iter_mut().find(|r| r.idempotency_key == key && r.user_id == user_id) {
                r.status = crate::idempotency::IdempotencyStatus::Complete;
                r.assertion_id = Some(assertion_id.to_string());
            }
            Ok(())
        }

        async fn cleanup_expired(&self) -> AppResult<u64> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct NoopNotifications;
    impl NotificationRepository for NoopNotifications {
        async fn insert_if_absent(
            &self,
            _recipient_id: &str,
            _actor_id: &str,
            _assertion_id: &str,
            _notification_type: crate::notify::NotificationType,
            _reaction_type: Option<crate::graph::model::ReactionType>,
        ) -> AppResult<Option<crate::notify::Notification>> {
            Ok(None)
        }
        async fn get_by_id(&self, _id: &str) -> AppResult<Option<crate::notify::Notification>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct NoopOutbox;
    impl OutboxRepository for NoopOutbox {
        async fn enqueue(&self, _n: &str, _a: crate::notify::Adapter) -> AppResult<()> {
            Ok(())
        }
        async fn fetch_due(&self, _a: crate::notify::Adapter, _l: u32) -> AppResult<Vec<crate::notify::OutboxRow>> {
            Ok(vec![])
        }
        async fn mark_delivered(&self, _id: &str) -> AppResult<()> {
            Ok(())
        }
        async fn mark_retry(
            &self,
            _id: &str,
            _a: u32,
            _n: chrono::DateTime<chrono::Utc>,
            _e: &str,
        ) -> AppResult<()> {
            Ok(())
        }
        async fn mark_failed(&self, _id: &str, _e: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopDrafts;
    impl DraftStore for NoopDrafts {
        async fn delete_draft(&self, _user_id: &str) -> AppResult<()> {
            Ok(())
        }
    }

    fn viewer(user_id: &str) -> Viewer {
        Viewer {
            user_id: user_id.to_string(),
            role: Role::User,
        }
    }

    fn moment(text: &str) -> Cso {
        Cso::new(
            AssertionType::Moment,
            text.to_string(),
            None,
            Visibility::Public,
            vec![],
            vec![],
            vec![],
            vec![],
        )
    }

    #[tokio::test]
    async fn idempotent_replay_returns_same_assertion() {
        let graph = Arc::new(FakeGraphStore::new());
        let idempotency_store = Arc::new(FakeIdempotency::default());
        let notifications = Arc::new(NoopNotifications);
        let outbox = Arc::new(NoopOutbox);
        let drafts = Arc::new(NoopDrafts);
        let delivery = DeliveryRegistry::new();
        let v = viewer("u1");

        let req = PublishRequest {
            cso: moment("hi"),
            supersedes_id: None,
            idempotency_key: Some("K1".into()),
            clear_draft: false,
        };
        let first = publish(
            graph.clone(),
            idempotency_store.clone(),
            notifications.clone(),
            outbox.clone(),
            drafts.clone(),
            delivery.clone(),
            &v,
            req,
        )
        .await
        .unwrap();
        assert!(!first.replayed);

        let req2 = PublishRequest {
            cso: moment("hi"),
            supersedes_id: None,
            idempotency_key: Some("K1".into()),
            clear_draft: false,
        };
        let second = publish(
            graph,
            idempotency_store,
            notifications,
            outbox,
            drafts,
            delivery,
            &v,
            req2,
        )
        .await
        .unwrap();
        assert!(second.replayed);
        assert_eq!(second.assertion_id, first.assertion_id);
    }

    #[tokio::test]
    async fn revision_race_yields_one_success_one_conflict() {
        let graph = Arc::new(FakeGraphStore::new());
        let idempotency_store = Arc::new(FakeIdempotency::default());
        let notifications = Arc::new(NoopNotifications);
        let outbox = Arc::new(NoopOutbox);
        let drafts = Arc::new(NoopDrafts);
        let delivery = DeliveryRegistry::new();
        let author = viewer("author");

        let original = publish(
            graph.clone(),
            idempotency_store.clone(),
            notifications.clone(),
            outbox.clone(),
            drafts.clone(),
            delivery.clone(),
            &author,
            PublishRequest {
                cso: moment("original"),
                supersedes_id: None,
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await
        .unwrap();

        let rev1 = publish(
            graph.clone(),
            idempotency_store.clone(),
            notifications.clone(),
            outbox.clone(),
            drafts.clone(),
            delivery.clone(),
            &author,
            PublishRequest {
                cso: moment("revision 1"),
                supersedes_id: Some(original.assertion_id.clone()),
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await;
        assert!(rev1.is_ok());

        let rev2 = publish(
            graph,
            idempotency_store,
            notifications,
            outbox,
            drafts,
            delivery,
            &author,
            PublishRequest {
                cso: moment("revision 2"),
                supersedes_id: Some(original.assertion_id.clone()),
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await;
        assert!(matches!(rev2, Err(AppError::RevisionConflict(_))));
    }

    #[tokio::test]
    async fn reply_to_tombstoned_is_gone() {
        let graph = Arc::new(FakeGraphStore::new());
        let idempotency_store = Arc::new(FakeIdempotency::default());
        let notifications = Arc::new(NoopNotifications);
        let outbox = Arc::new(NoopOutbox);
        let drafts = Arc::new(NoopDrafts);
        let delivery = DeliveryRegistry::new();
        let author = viewer("author");

        let original = publish(
            graph.clone(),
            idempotency_store.clone(),
            notifications.clone(),
            outbox.clone(),
            drafts.clone(),
            delivery.clone(),
            &author,
            PublishRequest {
                cso: moment("original"),
                supersedes_id: None,
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await
        .unwrap();

        graph
            .delete_assertion(&original.assertion_id, "author")
            .await
            .unwrap();

        let mut response_cso = moment("a reply");
        response_cso.assertion_type = AssertionType::Response;
        response_cso.refs = vec![AssertionRef {
            uri: original.assertion_id.clone(),
        }];

        let reply = publish(
            graph,
            idempotency_store,
            notifications,
            outbox,
            drafts,
            delivery,
            &viewer("replier"),
            PublishRequest {
                cso: response_cso,
                supersedes_id: None,
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await;

        assert!(matches!(reply, Err(AppError::Gone(_))));
    }

    #[tokio::test]
    async fn revision_by_non_author_non_admin_is_forbidden() {
        let graph = Arc::new(FakeGraphStore::new());
        let idempotency_store = Arc::new(FakeIdempotency::default());
        let notifications = Arc::new(NoopNotifications);
        let outbox = Arc::new(NoopOutbox);
        let drafts = Arc::new(NoopDrafts);
        let delivery = DeliveryRegistry::new();

        let original = publish(
            graph.clone(),
            idempotency_store.clone(),
            notifications.clone(),
            outbox.clone(),
            drafts.clone(),
            delivery.clone(),
            &viewer("author"),
            PublishRequest {
                cso: moment("original"),
                supersedes_id: None,
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await
        .unwrap();

        let result = publish(
            graph,
            idempotency_store,
            notifications,
            outbox,
            drafts,
            delivery,
            &viewer("stranger"),
            PublishRequest {
                cso: moment("hijacked revision"),
                supersedes_id: Some(original.assertion_id),
                idempotency_key: None,
                clear_draft: false,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
