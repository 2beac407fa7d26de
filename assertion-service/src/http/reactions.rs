use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::graph::model::ReactionType;
use crate::graph::{GraphStore, ReactionOutcome};
use crate::notify::{notify_reaction, NotificationRepository, OutboxRepository};
use crate::state::AppState;
use crate::viewer::Viewer;

#[derive(Debug, Deserialize)]
pub struct ReactionPayload {
    assertion_id: String,
    reaction_type: String,
}

#[derive(Debug, Serialize)]
pub struct AddReactionResponse {
    success: bool,
    action: &'static str,
}

pub async fn add_reaction(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(payload): Json<ReactionPayload>,
) -> AppResult<impl IntoResponse> {
    let reaction_type = ReactionType::parse(&payload.reaction_type)
        .ok_or_else(|| AppError::Validation(format!("unknown reaction type {}", payload.reaction_type)))?;

    let outcome = state
        .graph
        .add_reaction(&viewer.user_id, &payload.assertion_id, reaction_type)
        .await?;

    if outcome == ReactionOutcome::Added {
        if let Some(target) = state
            .graph
            .get_assertion_for_revision(&payload.assertion_id)
            .await?
        {
            // Dispatched in the background so the response doesn't wait on
            // notification derivation, matching the publish path.
            let notifications = state.notifications.clone();
            let outbox = state.outbox.clone();
            let delivery = state.delivery.clone();
            let actor_id = viewer.user_id.clone();
            let assertion_id = payload.assertion_id.clone();
            tokio::spawn(async move {
                if let Err(e) = notify_reaction(
                    notifications.as_ref(),
                    outbox.as_ref(),
                    &delivery,
                    &target.author_id,
                    &actor_id,
                    &assertion_id,
                    reaction_type,
                )
                .await
                {
                    tracing::warn!(near_miss = true, error = %e, "failed to derive reaction notification");
                }
            });
        }
    }

    let action = match outcome {
        ReactionOutcome::Added => "added",
        ReactionOutcome::AlreadyPresent => "unchanged",
    };

    Ok(Json(AddReactionResponse {
        success: true,
        action,
    }))
}

#[derive(Debug, Serialize)]
pub struct RemoveReactionResponse {
    removed: bool,
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(payload): Json<ReactionPayload>,
) -> AppResult<impl IntoResponse> {
    let reaction_type = ReactionType::parse(&payload.reaction_type)
        .ok_or_else(|| AppError::Validation(format!("unknown reaction type {}", payload.reaction_type)))?;

    let removed = state
        .graph
        .remove_reaction(&viewer.user_id, &payload.assertion_id, reaction_type)
        .await?;

    Ok(Json(RemoveReactionResponse { removed }))
}

#[derive(Debug, Serialize, Default)]
pub struct ReactionCountsResponse {
    like: u32,
    acknowledge: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    viewer_reactions: Vec<String>,
}

pub async fn reaction_counts(
    State(state): State<AppState>,
    viewer: Option<Viewer>,
    Path(assertion_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let viewer_id = viewer.as_ref().map(|v| v.user_id.as_str());
    let reactions = state
        .graph
        .get_reactions_for_assertion(&assertion_id, viewer_id)
        .await?;

    let mut response = ReactionCountsResponse::default();
    for r in &reactions {
        match r.reaction_type {
            ReactionType::Like => response.like += 1,
            ReactionType::Acknowledge => response.acknowledge += 1,
        }
        if Some(r.identity_id.as_str()) == viewer_id {
            response.viewer_reactions.push(match r.reaction_type {
                ReactionType::Like => "like".to_string(),
                ReactionType::Acknowledge => "acknowledge".to_string(),
            });
        }
    }

    Ok(Json(response))
}
