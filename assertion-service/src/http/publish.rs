use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::cso::Cso;
use crate::error::AppResult;
use crate::orchestrator::{self, PublishRequest};
use crate::state::AppState;
use crate::viewer::Viewer;

#[derive(Debug, Deserialize)]
pub struct PublishPayload {
    pub cso: Cso,
    #[serde(default)]
    #[allow(dead_code)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub clear_draft: bool,
    #[serde(default)]
    pub supersedes_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

pub async fn publish(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(payload): Json<PublishPayload>,
) -> AppResult<impl IntoResponse> {
    let request = PublishRequest {
        cso: payload.cso,
        supersedes_id: payload.supersedes_id,
        idempotency_key: payload.idempotency_key,
        clear_draft: payload.clear_draft,
    };

    let response = orchestrator::publish(
        state.graph.clone(),
        state.idempotency.clone(),
        state.notifications.clone(),
        state.outbox.clone(),
        state.drafts.clone(),
        state.delivery.clone(),
        &viewer,
        request,
    )
    .await?;

    let status = if response.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(response)))
}
