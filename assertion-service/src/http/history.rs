use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::graph::model::AssertionNode;
use crate::graph::GraphStore;
use crate::state::AppState;
use crate::viewer::Viewer;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    history: Vec<AssertionNode>,
    count: usize,
}

pub async fn history(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let history = state.graph.get_revision_history(&id).await?;

    let root = history
        .first()
        .ok_or_else(|| AppError::NotFound(format!("assertion {id} not found")))?;

    if root.author_id != viewer.user_id && !viewer.role.may_revise_any() {
        return Err(AppError::Forbidden(
            "only the author or an administrator may view revision history".into(),
        ));
    }

    let count = history.len();
    Ok(Json(HistoryResponse { history, count }))
}
