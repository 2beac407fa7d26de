//! Idempotency Store & Reconciler (C4): a Postgres-backed pending/complete
//! state machine per `(idempotencyKey, userId)`.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::graph::GraphStore;
use crate::graph::model::PublishedAssertion;

const TTL: Duration = Duration::hours(24);
const RECONCILE_THRESHOLD: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    Pending,
    Complete,
}

#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub user_id: String,
    pub assertion_id: Option<String>,
    pub status: IdempotencyStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait IdempotencyStore: Send + Sync {
    fn get_by_key(
        &self,
        key: &str,
        user_id: &str,
    ) -> impl Future<Output = AppResult<Option<IdempotencyRecord>>> + Send;

    fn create_pending(
        &self,
        key: &str,
        user_id: &str,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn complete(
        &self,
        key: &str,
        user_id: &str,
        assertion_id: &str,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn cleanup_expired(&self) -> impl Future<Output = AppResult<u64>> + Send;
}

pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdempotencyStore for PgIdempotencyStore {
    async fn get_by_key(&self, key: &str, user_id: &str) -> AppResult<Option<IdempotencyRecord>> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            "SELECT idempotency_key, user_id, assertion_id, status, created_at, expires_at \
             FROM publish_idempotency \
             WHERE idempotency_key = $1 AND user_id = $2 AND expires_at > now()",
        )
        .bind(key)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create_pending(&self, key: &str, user_id: &str) -> AppResult<()> {
        let expires_at = Utc::now() + TTL;
        sqlx::query(
            "INSERT INTO publish_idempotency (idempotency_key, user_id, status, created_at, expires_at) \
             VALUES ($1, $2, 'pending', now(), $3) \
             ON CONFLICT (idempotency_key, user_id) DO NOTHING",
        )
        .bind(key)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete(&self, key: &str, user_id: &str, assertion_id: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE publish_idempotency SET status = 'complete', assertion_id = $3 \
             WHERE idempotency_key = $1 AND user_id = $2 AND status = 'pending'",
        )
        .bind(key)
        .bind(user_id)
        .bind(assertion_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM publish_idempotency WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct IdempotencyRow {
    idempotency_key: String,
    user_id: String,
    assertion_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<IdempotencyRow> for IdempotencyRecord {
    fn from(row: IdempotencyRow) -> Self {
        Self {
            idempotency_key: row.idempotency_key,
            user_id: row.user_id,
            assertion_id: row.assertion_id,
            status: if row.status == "complete" {
                IdempotencyStatus::Complete
            } else {
                IdempotencyStatus::Pending
            },
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Reconciles a pending record found on a replayed request. Never
/// transitions pending -> complete without the graph confirming the
/// assertion exists with a matching author (invariant 11).
pub async fn reconcile_pending<S, G>(
    store: &S,
    graph: &G,
    record: &IdempotencyRecord,
) -> AppResult<Option<PublishedAssertion>>
where
    S: IdempotencyStore,
    G: GraphStore,
{
    let age = Utc::now() - record.created_at;
    if age < RECONCILE_THRESHOLD {
        tracing::warn!(
            near_miss = true,
            key = %record.idempotency_key,
            "idempotency record still fresh, declining to reconcile"
        );
        return Ok(None);
    }

    let Some(assertion_id) = &record.assertion_id else {
        return Ok(None);
    };

    let Some(assertion) = graph.get_assertion_for_revision(assertion_id).await? else {
        return Ok(None);
    };

    if assertion.author_id != record.user_id {
        return Ok(None);
    }

    store
        .complete(&record.idempotency_key, &record.user_id, assertion_id)
        .await?;

    Ok(Some(PublishedAssertion {
        assertion_id: assertion_id.clone(),
        created_at: record.created_at,
    }))
}

pub fn classify(record: &IdempotencyRecord) -> AppResult<()> {
    match record.status {
        IdempotencyStatus::Complete => Ok(()),
        IdempotencyStatus::Pending => Err(AppError::Idempotency(
            "publish is still pending reconciliation".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cso::{AssertionType, Cso, Visibility};
    use crate::graph::fake::FakeGraphStore;
    use crate::viewer::{Role, Viewer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeIdempotencyStore {
        records: Mutex<Vec<IdempotencyRecord>>,
    }

    impl IdempotencyStore for FakeIdempotencyStore {
        async fn get_by_key(&self, key: &str, user_id: &str) -> AppResult<Option<IdempotencyRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.idempotency_key == key && r.user_id == user_id)
                .cloned())
        }

        async fn create_pending(&self, key: &str, user_id: &str) -> AppResult<()> {
            self.records.lock().unwrap().push(IdempotencyRecord {
                idempotency_key: key.to_string(),
                user_id: user_id.to_string(),
                assertion_id: None,
                status: IdempotencyStatus::Pending,
                created_at: Utc::now(),
                expires_at: Utc::now() + TTL,
            });
            Ok(())
        }

        async fn complete(&self, key: &str, user_id: &str, assertion_id: &str) -> AppResult<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(r) = records
                .iter_mut()
                .find(|r| r.idempotency_key == key && r.user_id == user_id)
            {
                r.status = IdempotencyStatus::Complete;
                r.assertion_id = Some(assertion_id.to_string());
            }
            Ok(())
        }

        async fn cleanup_expired(&self) -> AppResult<u64> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.expires_at > Utc::now());
            Ok((before - records.len()) as u64)
        }
    }

    #[tokio::test]
    async fn fresh_pending_is_not_reconciled() {
        let store = FakeIdempotencyStore::default();
        let graph = FakeGraphStore::new();
        store.create_pending("K1", "u1").await.unwrap();
        let record = store.get_by_key("K1", "u1").await.unwrap().unwrap();

        let result = reconcile_pending(&store, &graph, &record).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn stale_pending_with_confirmed_graph_completes() {
        let store = FakeIdempotencyStore::default();
        let graph = FakeGraphStore::new();
        let viewer = Viewer {
            user_id: "u1".into(),
            role: Role::User,
        };
        let cso = Cso::new(
            AssertionType::Moment,
            "hi".into(),
            None,
            Visibility::Public,
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let published = graph.publish(&viewer, &cso, None, None).await.unwrap();

        store.create_pending("K1", "u1").await.unwrap();
        let mut record = store.get_by_key("K1", "u1").await.unwrap().unwrap();
        record.created_at = Utc::now() - Duration::minutes(10);
        record.assertion_id = Some(published.assertion_id.clone());

        let result = reconcile_pending(&store, &graph, &record).await.unwrap();
        assert_eq!(result.unwrap().assertion_id, published.assertion_id);
    }

    #[tokio::test]
    async fn stale_pending_with_mismatched_author_stays_unreconciled() {
        let store = FakeIdempotencyStore::default();
        let graph = FakeGraphStore::new();
        let viewer = Viewer {
            user_id: "someone-else".into(),
            role: Role::User,
        };
        let cso = Cso::new(
            AssertionType::Moment,
            "hi".into(),
            None,
            Visibility::Public,
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let published = graph.publish(&viewer, &cso, None, None).await.unwrap();

        let mut record = IdempotencyRecord {
            idempotency_key: "K1".into(),
            user_id: "u1".into(),
            assertion_id: Some(published.assertion_id),
            status: IdempotencyStatus::Pending,
            created_at: Utc::now() - Duration::minutes(10),
            expires_at: Utc::now() + TTL,
        };

        let result = reconcile_pending(&store, &graph, &record).await.unwrap();
        assert!(result.is_none());
        record.status = IdempotencyStatus::Pending;
    }
}
