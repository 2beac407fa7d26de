//! Graph Store Adapter trait (C3). RPITIT methods, mirroring the shape of
//! `acton_service::repository::traits::Repository`.

use std::future::Future;

use crate::cso::Cso;
use crate::error::AppResult;
use crate::graph::model::{
    AssertionForRevision, AssertionNode, GraphSlice, PublishedAssertion, ReactionEdge,
    ReactionType, RevisionMetadata,
};
use crate::pagination::HomeCursor;
use crate::viewer::Viewer;

pub struct HomePage {
    pub slice: GraphSlice,
    pub next_cursor: Option<HomeCursor>,
}

/// Persists CSOs, resolves revision/tombstone relationships, and answers
/// the slice queries the feed projector (C6) consumes.
pub trait GraphStore: Send + Sync {
    fn publish(
        &self,
        viewer: &Viewer,
        cso: &Cso,
        supersedes_id: Option<&str>,
        revision_metadata: Option<&RevisionMetadata>,
    ) -> impl Future<Output = AppResult<PublishedAssertion>> + Send;

    fn get_assertion_for_revision(
        &self,
        id: &str,
    ) -> impl Future<Output = AppResult<Option<AssertionForRevision>>> + Send;

    fn get_revision_history(
        &self,
        id: &str,
    ) -> impl Future<Output = AppResult<Vec<AssertionNode>>> + Send;

    fn delete_assertion(
        &self,
        id: &str,
        user_id: &str,
    ) -> impl Future<Output = AppResult<DeleteOutcome>> + Send;

    fn read_home_graph(
        &self,
        limit: u32,
        cursor: Option<HomeCursor>,
    ) -> impl Future<Output = AppResult<HomePage>> + Send;

    fn read_thread_graph(&self, root_id: &str) -> impl Future<Output = AppResult<GraphSlice>> + Send;

    fn add_reaction(
        &self,
        user_id: &str,
        assertion_id: &str,
        reaction_type: ReactionType,
    ) -> impl Future<Output = AppResult<ReactionOutcome>> + Send;

    fn remove_reaction(
        &self,
        user_id: &str,
        assertion_id: &str,
        reaction_type: ReactionType,
    ) -> impl Future<Output = AppResult<bool>> + Send;

    fn get_reactions_for_assertion(
        &self,
        assertion_id: &str,
        viewer_id: Option<&str>,
    ) -> impl Future<Output = AppResult<Vec<ReactionEdge>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    Added,
    AlreadyPresent,
}
