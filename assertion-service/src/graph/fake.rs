//! In-memory `GraphStore` used to unit-test C5/C6/C7 without a live Neo4j
//! instance, the way the teacher's repository tests substitute mocks for
//! real pools.

use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::cso::{AssertionType, Cso};
use crate::error::{AppError, AppResult};
use crate::graph::model::{
    AssertionForRevision, AssertionNode, GraphSlice, PublishedAssertion, ReactionEdge,
    ReactionType, RevisionMetadata,
};
use crate::graph::store::{DeleteOutcome, GraphStore, HomePage, ReactionOutcome};
use crate::pagination::HomeCursor;
use crate::viewer::Viewer;

#[derive(Default)]
pub struct FakeGraphStore {
    inner: Mutex<GraphSlice>,
}

impl FakeGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slice(&self) -> GraphSlice {
        self.inner.lock().unwrap().clone()
    }
}

impl GraphStore for FakeGraphStore {
    async fn publish(
        &self,
        viewer: &Viewer,
        cso: &Cso,
        supersedes_id: Option<&str>,
        revision_metadata: Option<&RevisionMetadata>,
    ) -> AppResult<PublishedAssertion> {
        let mut slice = self.inner.lock().unwrap();

        let parent_ref = if cso.assertion_type == AssertionType::Response {
            cso.refs.first().map(|r| r.uri.clone())
        } else {
            None
        };

        if let Some(parent_id) = &parent_ref {
            let parent = slice.assertions.iter().find(|a| &a.id == parent_id);
            match parent {
                None => return Err(AppError::NotFound(format!("parent {parent_id} not found"))),
                Some(p) if p.assertion_type == AssertionType::Tombstone => {
                    return Err(AppError::Gone("reply target has been tombstoned".into()));
                }
                Some(_) => {}
            }
            let tombstoned = slice.assertions.iter().any(|a| {
                a.assertion_type == AssertionType::Tombstone
                    && a.supersedes_id.as_deref() == Some(parent_id.as_str())
            });
            if tombstoned {
                return Err(AppError::Gone("reply target has been tombstoned".into()));
            }
        }

        if let Some(sid) = supersedes_id {
            let already_claimed = slice
                .assertions
                .iter()
                .any(|a| a.supersedes_id.as_deref() == Some(sid));
            if already_claimed {
                return Err(AppError::RevisionConflict(
                    "assertion has already been revised or deleted".into(),
                ));
            }
        }

        let id = format!("asn_{}", Uuid::new_v4());
        let now = Utc::now();

        slice.assertions.push(AssertionNode {
            id: id.clone(),
            assertion_type: cso.assertion_type,
            text: cso.text.clone(),
            title: cso.title.clone(),
            visibility: cso.visibility,
            media: cso.media.iter().map(|m| m.url.clone()).collect(),
            created_at: now,
            author_id: viewer.user_id.clone(),
            supersedes_id: supersedes_id.map(|s| s.to_string()),
            revision_number: revision_metadata.map(|r| r.revision_number),
            root_assertion_id: revision_metadata.map(|r| r.root_assertion_id.clone()),
        });

        if let Some(parent_id) = &parent_ref {
            slice.responds_to.push((id.clone(), parent_id.clone()));
        }
        for topic in &cso.topics {
            slice.tagged_with.push((id.clone(), topic.clone()));
        }
        for mention in &cso.mentions {
            slice.mentions.push((id.clone(), mention.clone()));
        }
        if let Some(sid) = supersedes_id {
            slice.supersedes.push((id.clone(), sid.to_string()));
        }

        Ok(PublishedAssertion {
            assertion_id: id,
            created_at: now,
        })
    }

    async fn get_assertion_for_revision(
        &self,
        id: &str,
    ) -> AppResult<Option<AssertionForRevision>> {
        let slice = self.inner.lock().unwrap();
        Ok(slice
            .assertions
            .iter()
            .find(|a| a.id == id)
            .map(|a| AssertionForRevision {
                id: a.id.clone(),
                author_id: a.author_id.clone(),
                supersedes_id: a.supersedes_id.clone(),
            }))
    }

    async fn get_revision_history(&self, id: &str) -> AppResult<Vec<AssertionNode>> {
        let slice = self.inner.lock().unwrap();
        let root = slice
            .assertions
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| a.root_assertion_id.clone())
            .unwrap_or_else(|| id.to_string());

        let mut history: Vec<AssertionNode> = slice
            .assertions
            .iter()
            .filter(|a| a.id == root || a.root_assertion_id.as_deref() == Some(root.as_str()))
            .cloned()
            .collect();
        history.sort_by_key(|a| a.created_at);
        Ok(history)
    }

    async fn delete_assertion(&self, id: &str, user_id: &str) -> AppResult<DeleteOutcome> {
        let mut slice = self.inner.lock().unwrap();

        let target = slice
            .assertions
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("assertion {id} not found")))?;

        if target.author_id != user_id {
            return Err(AppError::Forbidden(
                "only the author may delete this assertion".into(),
            ));
        }

        if let Some(superseder) = slice.assertions.iter().find(|a| a.supersedes_id.as_deref() == Some(id)) {
            return if superseder.assertion_type == AssertionType::Tombstone {
                Ok(DeleteOutcome::AlreadyDeleted)
            } else {
                Err(AppError::Conflict("assertion has already been superseded".into()))
            };
        }

        let tomb_id = format!("asn_{}", Uuid::new_v4());
        slice.assertions.push(AssertionNode {
            id: tomb_id,
            assertion_type: AssertionType::Tombstone,
            text: String::new(),
            title: None,
            visibility: target.visibility,
            media: vec![],
            created_at: Utc::now(),
            author_id: user_id.to_string(),
            supersedes_id: Some(id.to_string()),
            revision_number: None,
            root_assertion_id: None,
        });

        Ok(DeleteOutcome::Deleted)
    }

    async fn read_home_graph(&self, limit: u32, cursor: Option<HomeCursor>) -> AppResult<HomePage> {
        let slice = self.inner.lock().unwrap();
        let superseded: std::collections::HashSet<&str> =
            slice.supersedes.iter().map(|(_, old)| old.as_str()).collect();

        let mut roots: Vec<AssertionNode> = slice
            .assertions
            .iter()
            .filter(|a| {
                a.assertion_type != AssertionType::Response
                    && a.assertion_type != AssertionType::Tombstone
                    && !superseded.contains(a.id.as_str())
                    && !slice.responds_to.iter().any(|(child, _)| child == &a.id)
            })
            .cloned()
            .collect();

        roots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        if let Some(cursor) = &cursor {
            roots.retain(|a| {
                (a.created_at, a.id.as_str()) < (cursor.created_at, cursor.id.as_str())
            });
        }

        let next_cursor = if roots.len() as u32 > limit {
            roots.truncate(limit as usize);
            roots.last().map(|a| HomeCursor {
                created_at: a.created_at,
                id: a.id.clone(),
            })
        } else {
            None
        };

        let root_ids: std::collections::HashSet<&str> =
            roots.iter().map(|a| a.id.as_str()).collect();

        let mut out = slice.clone();
        out.assertions = roots
            .into_iter()
            .chain(
                slice
                    .assertions
                    .iter()
                    .filter(|a| {
                        slice
                            .responds_to
                            .iter()
                            .any(|(child, parent)| child == &a.id && root_ids.contains(parent.as_str()))
                    })
                    .cloned(),
            )
            .collect();

        Ok(HomePage {
            slice: out,
            next_cursor,
        })
    }

    async fn read_thread_graph(&self, root_id: &str) -> AppResult<GraphSlice> {
        let slice = self.inner.lock().unwrap();

        let mut reachable = std::collections::HashSet::new();
        reachable.insert(root_id.to_string());
        loop {
            let before = reachable.len();
            for (child, parent) in &slice.responds_to {
                if reachable.contains(parent) {
                    reachable.insert(child.clone());
                }
            }
            if reachable.len() == before {
                break;
            }
        }

        let assertions: Vec<AssertionNode> = slice
            .assertions
            .iter()
            .filter(|a| reachable.contains(&a.id) && a.assertion_type != AssertionType::Tombstone)
            .cloned()
            .collect();

        let ids: std::collections::HashSet<&str> = assertions.iter().map(|a| a.id.as_str()).collect();

        let mut out = GraphSlice {
            assertions,
            responds_to: slice
                .responds_to
                .iter()
                .filter(|(c, _)| ids.contains(c.as_str()))
                .cloned()
                .collect(),
            supersedes: slice
                .supersedes
                .iter()
                .filter(|(new, _)| ids.contains(new.as_str()))
                .cloned()
                .collect(),
            reactions: slice
                .reactions
                .iter()
                .filter(|r| ids.contains(r.assertion_id.as_str()))
                .cloned()
                .collect(),
            tagged_with: vec![],
            mentions: vec![],
        };
        out.tagged_with = slice
            .tagged_with
            .iter()
            .filter(|(a, _)| ids.contains(a.as_str()))
            .cloned()
            .collect();
        out.mentions = slice
            .mentions
            .iter()
            .filter(|(a, _)| ids.contains(a.as_str()))
            .cloned()
            .collect();
        Ok(out)
    }

    async fn add_reaction(
        &self,
        user_id: &str,
        assertion_id: &str,
        reaction_type: ReactionType,
    ) -> AppResult<ReactionOutcome> {
        let mut slice = self.inner.lock().unwrap();

        let target = slice
            .assertions
            .iter()
            .find(|a| a.id == assertion_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("assertion {assertion_id} not found")))?;

        if target.assertion_type == AssertionType::Tombstone {
            return Err(AppError::Conflict("assertion is tombstoned".into()));
        }
        if slice.supersedes.iter().any(|(_, old)| old == assertion_id) {
            return Err(AppError::Conflict("assertion has been superseded".into()));
        }
        if target.visibility != crate::cso::Visibility::Public && target.author_id != user_id {
            return Err(AppError::Forbidden(
                "cannot react to a non-public assertion you do not own".into(),
            ));
        }

        let exists = slice.reactions.iter().any(|r| {
            r.identity_id == user_id && r.assertion_id == assertion_id && r.reaction_type == reaction_type
        });
        if exists {
            return Ok(ReactionOutcome::AlreadyPresent);
        }

        slice.reactions.push(ReactionEdge {
            identity_id: user_id.to_string(),
            assertion_id: assertion_id.to_string(),
            reaction_type,
            created_at: Utc::now(),
        });
        Ok(ReactionOutcome::Added)
    }

    async fn remove_reaction(
        &self,
        user_id: &str,
        assertion_id: &str,
        reaction_type: ReactionType,
    ) -> AppResult<bool> {
        let mut slice = self.inner.lock().unwrap();
        let before = slice.reactions.len();
        slice.reactions.retain(|r| {
            !(r.identity_id == user_id && r.assertion_id == assertion_id && r.reaction_type == reaction_type)
        });
        Ok(slice.reactions.len() != before)
    }

    async fn get_reactions_for_assertion(
        &self,
        assertion_id: &str,
        _viewer_id: Option<&str>,
    ) -> AppResult<Vec<ReactionEdge>> {
        let slice = self.inner.lock().unwrap();
        Ok(slice
            .reactions
            .iter()
            .filter(|r| r.assertion_id == assertion_id)
            .cloned()
            .collect())
    }
}
