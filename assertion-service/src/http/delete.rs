use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::error::AppResult;
use crate::graph::{GraphStore, DeleteOutcome};
use crate::state::AppState;
use crate::viewer::Viewer;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    deleted: bool,
}

pub async fn delete_assertion(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.graph.delete_assertion(&id, &viewer.user_id).await?;
    Ok(Json(DeleteResponse {
        deleted: matches!(outcome, DeleteOutcome::Deleted | DeleteOutcome::AlreadyDeleted),
    }))
}
