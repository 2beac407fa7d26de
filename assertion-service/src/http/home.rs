use axum::{extract::{Query, State}, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::graph::GraphStore;
use crate::pagination::HomeCursor;
use crate::projector::{assemble_home, HomeItem};
use crate::state::AppState;
use crate::viewer::Viewer;

const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    items: Vec<HomeItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}

/// `viewer` is optional here: unauthenticated callers see only public
/// assertions, matching `is_visible`'s public-always-visible rule.
pub async fn home(
    State(state): State<AppState>,
    viewer: Option<Viewer>,
    Query(query): Query<HomeQuery>,
) -> AppResult<impl IntoResponse> {
    let cursor = query.cursor.as_deref().map(HomeCursor::decode).transpose()?;

    let page = state.graph.read_home_graph(PAGE_SIZE, cursor).await?;
    let environment = state.config.service.environment;
    let viewer_id = viewer.as_ref().map(|v| v.user_id.as_str());

    let items = assemble_home(&page.slice, viewer_id, environment);

    Ok(Json(HomeResponse {
        items,
        next_cursor: page.next_cursor.map(|c| c.encode()),
    }))
}
