//! Feed Projector (C6): a pure, synchronous transformation from a graph
//! slice to ordered, visibility-filtered, version-resolved feed/thread
//! items. No I/O — everything here operates on already-fetched slices.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Environment;
use crate::cso::{AssertionType, Visibility};
use crate::graph::model::{AssertionNode, GraphSlice, ReactionType};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReactionCounts {
    pub like: u32,
    pub acknowledge: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub id: String,
    pub assertion_type: AssertionType,
    pub text: String,
    pub title: Option<String>,
    pub visibility: Visibility,
    pub media: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub reaction_counts: ReactionCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeItem {
    #[serde(flatten)]
    pub assertion: FeedItem,
    pub responses: Vec<FeedItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadResult {
    pub root: FeedItem,
    pub responses: Vec<FeedItem>,
    pub count: usize,
}

/// `SUPERSEDES` points new -> old; the *target* of each edge is superseded.
fn superseded_targets(slice: &GraphSlice) -> HashSet<&str> {
    slice.supersedes.iter().map(|(_, old)| old.as_str()).collect()
}

fn is_head(node: &AssertionNode, superseded: &HashSet<&str>) -> bool {
    node.assertion_type != AssertionType::Tombstone && !superseded.contains(node.id.as_str())
}

pub fn is_visible(node: &AssertionNode, viewer_id: Option<&str>) -> bool {
    match node.visibility {
        Visibility::Public => true,
        Visibility::Private | Visibility::Followers | Visibility::Unlisted => {
            viewer_id == Some(node.author_id.as_str())
        }
    }
}

fn reaction_counts(slice: &GraphSlice, assertion_id: &str) -> ReactionCounts {
    let mut counts = ReactionCounts::default();
    for r in &slice.reactions {
        if r.assertion_id != assertion_id {
            continue;
        }
        match r.reaction_type {
            ReactionType::Like => counts.like += 1,
            ReactionType::Acknowledge => counts.acknowledge += 1,
        }
    }
    counts
}

fn to_feed_item(node: &AssertionNode, slice: &GraphSlice, reply_to: Option<String>) -> FeedItem {
    FeedItem {
        id: node.id.clone(),
        assertion_type: node.assertion_type,
        text: node.text.clone(),
        title: node.title.clone(),
        visibility: node.visibility,
        media: node.media.clone(),
        created_at: node.created_at,
        author_id: node.author_id.clone(),
        reaction_counts: reaction_counts(slice, &node.id),
        reply_to,
    }
}

fn assert_root_purity(items: &[HomeItem], environment: Environment) {
    let violation = items
        .iter()
        .find(|i| i.assertion.assertion_type == AssertionType::Response);

    let Some(violation) = violation else {
        return;
    };

    match environment {
        Environment::Test => {
            panic!(
                "root-purity violation: home feed emitted response {}",
                violation.assertion.id
            );
        }
        Environment::Development => {
            tracing::error!(
                assertion_id = %violation.assertion.id,
                "root-purity violation: home feed emitted a response"
            );
        }
        Environment::Production => {
            tracing::warn!(
                near_miss = true,
                assertion_id = %violation.assertion.id,
                "root-purity violation: home feed emitted a response"
            );
        }
    }
}

/// Assembles the home feed: heads only, roots only, visibility-filtered,
/// with direct responses attached per root.
pub fn assemble_home(
    slice: &GraphSlice,
    viewer_id: Option<&str>,
    environment: Environment,
) -> Vec<HomeItem> {
    let superseded = superseded_targets(slice);

    let has_outgoing_responds_to: HashSet<&str> =
        slice.responds_to.iter().map(|(child, _)| child.as_str()).collect();

    let mut roots: Vec<&AssertionNode> = slice
        .assertions
        .iter()
        .filter(|a| is_head(a, &superseded))
        .filter(|a| a.assertion_type != AssertionType::Response)
        .filter(|a| !has_outgoing_responds_to.contains(a.id.as_str()))
        .filter(|a| is_visible(a, viewer_id))
        .collect();

    roots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let items = roots
        .into_iter()
        .map(|root| {
            let responses = direct_responses(slice, &root.id, viewer_id);
            HomeItem {
                assertion: to_feed_item(root, slice, None),
                responses,
            }
        })
        .collect::<Vec<_>>();

    assert_root_purity(&items, environment);
    items
}

/// Attaches direct responses to `parent_id`, version-resolved *scoped to
/// that response set* rather than globally.
fn direct_responses(slice: &GraphSlice, parent_id: &str, viewer_id: Option<&str>) -> Vec<FeedItem> {
    let direct_child_ids: HashSet<&str> = slice
        .responds_to
        .iter()
        .filter(|(_, parent)| parent == parent_id)
        .map(|(child, _)| child.as_str())
        .collect();

    let scoped_superseded: HashSet<&str> = slice
        .supersedes
        .iter()
        .filter(|(new, _)| direct_child_ids.contains(new.as_str()))
        .map(|(_, old)| old.as_str())
        .collect();

    let mut responses: Vec<&AssertionNode> = slice
        .assertions
        .iter()
        .filter(|a| direct_child_ids.contains(a.id.as_str()))
        .filter(|a| is_head(a, &scoped_superseded))
        .filter(|a| is_visible(a, viewer_id))
        .collect();

    responses.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    responses
        .into_iter()
        .map(|a| to_feed_item(a, slice, Some(parent_id.to_string())))
        .collect()
}

/// Assembles a thread: BFS down from `root_id` through `RESPONDS_TO`,
/// version-resolved globally (nested replies remain reachable even when
/// their direct parent has since been superseded).
pub fn assemble_thread(slice: &GraphSlice, root_id: &str, viewer_id: Option<&str>) -> Option<ThreadResult> {
    let superseded = superseded_targets(slice);

    let by_id: HashMap<&str, &AssertionNode> =
        slice.assertions.iter().map(|a| (a.id.as_str(), a)).collect();

    let root = by_id.get(root_id).copied()?;

    // Reply-to map keyed by parent so replies nested under a superseded
    // node remain reachable via the chain of child->parent edges already
    // present in the slice.
    let mut by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
    for (child, parent) in &slice.responds_to {
        by_parent.entry(parent.as_str()).or_default().push(child.as_str());
    }

    // Walk from root; when a node has been superseded, walk its replies
    // as if they pointed at the current head for reply-to labeling, but
    // keep BFS traversal on the raw edges (they never change).
    let mut queue: Vec<&str> = vec![root_id];
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<&AssertionNode> = Vec::new();

    while let Some(id) = queue.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(node) = by_id.get(id) {
            if is_head(node, &superseded) && is_visible(node, viewer_id) {
                ordered.push(node);
            }
        }
        if let Some(children) = by_parent.get(id) {
            queue.extend(children.iter().copied());
        }
    }

    let mut responses: Vec<&AssertionNode> = ordered
        .into_iter()
        .filter(|a| a.id != root_id)
        .collect();
    responses.sort_by_key(|a| a.created_at);

    let parent_of: HashMap<&str, &str> = slice
        .responds_to
        .iter()
        .map(|(child, parent)| (child.as_str(), parent.as_str()))
        .collect();

    // `RESPONDS_TO` is immutable: a revision keeps the parent pointer it
    // was published with, so reply_to is always the raw edge target, never
    // resolved to the parent's current head (see scenario S4).
    let response_items: Vec<FeedItem> = responses
        .into_iter()
        .map(|a| {
            let reply_to = parent_of.get(a.id.as_str()).map(|p| p.to_string());
            to_feed_item(a, slice, reply_to)
        })
        .collect();

    let count = 1 + response_items.len();

    Some(ThreadResult {
        root: to_feed_item(root, slice, None),
        responses: response_items,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn node(
        id: &str,
        assertion_type: AssertionType,
        author: &str,
        visibility: Visibility,
        created_offset_secs: i64,
    ) -> AssertionNode {
        AssertionNode {
            id: id.to_string(),
            assertion_type,
            text: "x".to_string(),
            title: None,
            visibility,
            media: vec![],
            created_at: Utc::now() + Duration::seconds(created_offset_secs),
            author_id: author.to_string(),
            supersedes_id: None,
            revision_number: None,
            root_assertion_id: None,
        }
    }

    #[test]
    fn root_purity_excludes_responses() {
        let mut slice = GraphSlice::default();
        slice.assertions.push(node("root1", AssertionType::Moment, "u1", Visibility::Public, 0));
        let items = assemble_home(&slice, None, Environment::Test);
        assert!(items.iter().all(|i| i.assertion.assertion_type != AssertionType::Response));
    }

    #[test]
    fn home_excludes_private_unless_owner() {
        let mut slice = GraphSlice::default();
        slice.assertions.push(node("root1", AssertionType::Moment, "u1", Visibility::Private, 0));

        let as_stranger = assemble_home(&slice, Some("u2"), Environment::Test);
        assert!(as_stranger.is_empty());

        let as_owner = assemble_home(&slice, Some("u1"), Environment::Test);
        assert_eq!(as_owner.len(), 1);
    }

    #[test]
    fn version_resolution_keeps_only_head() {
        let mut slice = GraphSlice::default();
        slice.assertions.push(node("v1", AssertionType::Moment, "u1", Visibility::Public, -20));
        slice.assertions.push(node("v2", AssertionType::Moment, "u1", Visibility::Public, -10));
        slice.assertions.push(node("v3", AssertionType::Moment, "u1", Visibility::Public, 0));
        slice.supersedes.push(("v2".into(), "v1".into()));
        slice.supersedes.push(("v3".into(), "v2".into()));

        let items = assemble_home(&slice, None, Environment::Test);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].assertion.id, "v3");
    }

    #[test]
    fn reaction_aggregation_is_non_structural() {
        let mut slice = GraphSlice::default();
        slice.assertions.push(node("root1", AssertionType::Moment, "u1", Visibility::Public, 0));

        let without_reactions = assemble_home(&slice, None, Environment::Test);
        let ids_without: Vec<_> = without_reactions.iter().map(|i| i.assertion.id.clone()).collect();

        slice.reactions.push(crate::graph::model::ReactionEdge {
            identity_id: "u2".into(),
            assertion_id: "root1".into(),
            reaction_type: ReactionType::Like,
            created_at: Utc::now(),
        });

        let with_reactions = assemble_home(&slice, None, Environment::Test);
        let ids_with: Vec<_> = with_reactions.iter().map(|i| i.assertion.id.clone()).collect();

        assert_eq!(ids_without, ids_with);
        assert_eq!(with_reactions[0].assertion.reaction_counts.like, 1);
    }

    #[test]
    fn thread_reachability_through_superseded_reply() {
        let mut slice = GraphSlice::default();
        let root = node("root", AssertionType::Moment, "u1", Visibility::Public, -30);
        let r1 = node("r1", AssertionType::Response, "u2", Visibility::Public, -20);
        let r1_rev = node("r1b", AssertionType::Response, "u2", Visibility::Public, -15);
        let r2 = node("r2", AssertionType::Response, "u3", Visibility::Public, -10);

        slice.assertions.push(root);
        slice.assertions.push(r1);
        slice.assertions.push(r1_rev.clone());
        slice.assertions.push(r2);

        slice.responds_to.push(("r1".into(), "root".into()));
        slice.responds_to.push(("r1b".into(), "root".into()));
        slice.responds_to.push(("r2".into(), "r1".into()));
        slice.supersedes.push(("r1b".into(), "r1".into()));

        let result = assemble_thread(&slice, "root", None).unwrap();
        assert_eq!(result.count, 3);
        let ids: Vec<_> = result.responses.iter().map(|r| r.id.clone()).collect();
        assert!(ids.contains(&"r1b".to_string()));
        assert!(ids.contains(&"r2".to_string()));
        assert!(!ids.contains(&"r1".to_string()));
    }

    #[test]
    #[should_panic(expected = "root-purity violation")]
    fn root_purity_panics_in_test_environment_when_violated() {
        let mut slice = GraphSlice::default();
        let mut response = node("r1", AssertionType::Response, "u1", Visibility::Public, 0);
        response.assertion_type = AssertionType::Response;
        slice.assertions.push(response);

        // Forcing a violation directly through the internal assertion
        // helper, since `assemble_home` itself already filters responses
        // out — this exercises the guard rather than the filter.
        let items = vec![HomeItem {
            assertion: to_feed_item(&slice.assertions[0], &slice, None),
            responses: vec![],
        }];
        assert_root_purity(&items, Environment::Test);
    }

    #[test]
    fn reaction_idempotence_is_enforced_by_the_store_not_the_projector() {
        // The projector trusts its input slice; idempotence of the
        // underlying REACTED_TO edge is the graph store's responsibility
        // (see graph::fake::tests and graph::neo4j_store).
        let _ = Uuid::new_v4();
    }
}
