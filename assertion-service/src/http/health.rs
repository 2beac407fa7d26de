use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::jobs::job_health_summary;
use crate::state::AppState;

pub async fn job_health(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    if !state.config.service.health_endpoints_enabled {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let summary = job_health_summary(&state.jobs.pool()).await?;
    Ok(Json(summary).into_response())
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    status: &'static str,
    service: &'static str,
}

/// Liveness probe. Always 200 if the process is answering requests at all.
pub async fn health() -> impl IntoResponse {
    Json(LivenessResponse {
        status: "healthy",
        service: "assertion-service",
    })
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    postgres: bool,
}

/// Readiness probe: 200 only once the Postgres pool answers `SELECT 1`.
/// The graph store has no equally cheap probe exposed by `Neo4jGraphStore`,
/// so readiness here tracks the relational store, matching what the
/// relational-backed repositories (idempotency, notifications, outbox,
/// drafts, jobs) actually need to be usable.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let postgres = sqlx::query("SELECT 1")
        .execute(state.jobs.pool())
        .await
        .is_ok();

    let status = if postgres {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: postgres,
            postgres,
        }),
    )
}
