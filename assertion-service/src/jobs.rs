//! Job Runner & Health (C9): wraps scheduled maintenance jobs with a
//! run-log and exposes drift/consecutive-failure health.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Success,
    Failed,
}

pub struct JobRunner {
    pool: PgPool,
}

impl JobRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn start_job_run(&self, job_name: &str) -> AppResult<String> {
        let id = Uuid::now_v7().to_string();
        sqlx::query(
            "INSERT INTO job_runs (id, job_name, started_at, status) \
             VALUES ($1, $2, now(), 'running')",
        )
        .bind(&id)
        .bind(job_name)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn complete_job_run(&self, id: &str, row_count: u64) -> AppResult<()> {
        sqlx::query(
            "UPDATE job_runs SET finished_at = now(), status = 'success', row_count = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(row_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_job_run(&self, id: &str, error: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE job_runs SET finished_at = now(), status = 'failed', error = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Runs `body`, wrapping it with `start_job_run`/`complete_job_run`/`fail_job_run`.
    pub async fn run_tracked<F, Fut>(&self, job_name: &str, body: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<u64>>,
    {
        let run_id = match self.start_job_run(job_name).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(job = job_name, error = %e, "failed to record job start");
                return;
            }
        };

        match body().await {
            Ok(row_count) => {
                if let Err(e) = self.complete_job_run(&run_id, row_count).await {
                    tracing::error!(job = job_name, error = %e, "failed to record job completion");
                }
            }
            Err(e) => {
                tracing::error!(job = job_name, error = %e, "job run failed");
                if let Err(e) = self.fail_job_run(&run_id, &e.to_string()).await {
                    tracing::error!(job = job_name, error = %e, "failed to record job failure");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobHealthStatus {
    Failing,
    Drifting,
    Healthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobHealth {
    pub job_name: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_row_count: Option<i64>,
    pub consecutive_failures: u32,
    pub drift_hours: Option<f64>,
    pub status: JobHealthStatus,
}

#[derive(sqlx::FromRow)]
struct JobRunRow {
    job_name: String,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    row_count: Option<i64>,
}

pub async fn job_health_summary(pool: &PgPool) -> AppResult<Vec<JobHealth>> {
    let rows: Vec<JobRunRow> = sqlx::query_as(
        "SELECT job_name, finished_at, status, row_count FROM job_runs \
         WHERE status != 'running' ORDER BY job_name, finished_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut summaries: Vec<JobHealth> = Vec::new();
    let mut current_job: Option<&str> = None;
    let mut consecutive_failures = 0u32;
    let mut last_success_at = None;
    let mut last_row_count = None;

    for row in &rows {
        if current_job != Some(row.job_name.as_str()) {
            if let Some(job_name) = current_job {
                summaries.push(finalize(job_name, last_success_at, last_row_count, consecutive_failures));
            }
            current_job = Some(row.job_name.as_str());
            consecutive_failures = 0;
            last_success_at = None;
            last_row_count = None;
        }

        if row.status == "success" && last_success_at.is_none() {
            last_success_at = row.finished_at;
            last_row_count = row.row_count;
        } else if row.status == "failed" && last_success_at.is_none() {
            consecutive_failures += 1;
        }
    }

    if let Some(job_name) = current_job {
        summaries.push(finalize(job_name, last_success_at, last_row_count, consecutive_failures));
    }

    Ok(summaries)
}

fn finalize(
    job_name: &str,
    last_success_at: Option<DateTime<Utc>>,
    last_row_count: Option<i64>,
    consecutive_failures: u32,
) -> JobHealth {
    let drift_hours = last_success_at.map(|t| (Utc::now() - t).num_seconds() as f64 / 3600.0);

    let status = if consecutive_failures >= 3 || last_success_at.is_none() {
        JobHealthStatus::Failing
    } else if drift_hours.is_some_and(|h| h > 48.0) {
        JobHealthStatus::Drifting
    } else {
        JobHealthStatus::Healthy
    };

    JobHealth {
        job_name: job_name.to_string(),
        last_success_at,
        last_row_count,
        consecutive_failures,
        drift_hours,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_failures_is_failing() {
        let h = finalize("outbox_cleanup", None, None, 3);
        assert_eq!(h.status, JobHealthStatus::Failing);
    }

    #[test]
    fn never_succeeded_is_failing() {
        let h = finalize("outbox_cleanup", None, None, 0);
        assert_eq!(h.status, JobHealthStatus::Failing);
    }

    #[test]
    fn stale_success_is_drifting() {
        let h = finalize(
            "outbox_cleanup",
            Some(Utc::now() - chrono::Duration::hours(72)),
            Some(10),
            0,
        );
        assert_eq!(h.status, JobHealthStatus::Drifting);
    }

    #[test]
    fn recent_success_is_healthy() {
        let h = finalize("outbox_cleanup", Some(Utc::now()), Some(10), 0);
        assert_eq!(h.status, JobHealthStatus::Healthy);
    }
}
