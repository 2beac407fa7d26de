//! Node/edge taxonomy for the assertion graph (C2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cso::{AssertionType, Visibility};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionNode {
    pub id: String,
    pub assertion_type: AssertionType,
    pub text: String,
    pub title: Option<String>,
    pub visibility: Visibility,
    pub media: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub supersedes_id: Option<String>,
    pub revision_number: Option<u32>,
    pub root_assertion_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityNode {
    pub id: String,
    pub handle: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Acknowledge,
}

impl ReactionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionType::Like),
            "acknowledge" => Some(ReactionType::Acknowledge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEdge {
    pub identity_id: String,
    pub assertion_id: String,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
}

/// An edge pointing from a `response`-typed assertion to its parent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RespondsToEdge<'a> {
    pub child: &'a str,
    pub parent: &'a str,
}

/// A slice of the graph returned by a store query, consumed by the pure
/// projector (C6). Edge direction follows the data model: `SUPERSEDES`
/// points new -> old, `RESPONDS_TO` points response -> parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSlice {
    pub assertions: Vec<AssertionNode>,
    /// (child_id, parent_id)
    pub responds_to: Vec<(String, String)>,
    /// (new_id, old_id)
    pub supersedes: Vec<(String, String)>,
    pub reactions: Vec<ReactionEdge>,
    /// (assertion_id, topic)
    pub tagged_with: Vec<(String, String)>,
    /// (assertion_id, identity_id)
    pub mentions: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedAssertion {
    pub assertion_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RevisionMetadata {
    pub revision_number: u32,
    pub root_assertion_id: String,
}

#[derive(Debug, Clone)]
pub struct AssertionForRevision {
    pub id: String,
    pub author_id: String,
    pub supersedes_id: Option<String>,
}
