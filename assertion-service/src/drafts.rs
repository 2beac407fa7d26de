//! Composer draft persistence: a stub external collaborator (spec.md §1)
//! narrowed to the single `deleteDraft(userId)` call the orchestrator needs.

use sqlx::PgPool;

use crate::error::AppResult;
use crate::orchestrator::DraftStore;

pub struct PgDraftStore {
    pool: PgPool,
}

impl PgDraftStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DraftStore for PgDraftStore {
    async fn delete_draft(&self, user_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM composer_drafts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl PgDraftStore {
    /// Deletes drafts untouched for longer than `older_than_hours`, the
    /// scheduled maintenance job named alongside idempotency/outbox cleanup.
    pub async fn cleanup_stale(&self, older_than_hours: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM composer_drafts \
             WHERE updated_at <= now() - ($1 || ' hours')::interval",
        )
        .bind(older_than_hours.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
