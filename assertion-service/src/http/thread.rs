use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::error::{AppError, AppResult};
use crate::graph::GraphStore;
use crate::projector::assemble_thread;
use crate::state::AppState;
use crate::viewer::Viewer;

pub async fn thread(
    State(state): State<AppState>,
    viewer: Option<Viewer>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let slice = state.graph.read_thread_graph(&id).await?;
    let viewer_id = viewer.as_ref().map(|v| v.user_id.as_str());

    let result = assemble_thread(&slice, &id, viewer_id)
        .ok_or_else(|| AppError::NotFound(format!("assertion {id} not found")))?;

    Ok(Json(result))
}
