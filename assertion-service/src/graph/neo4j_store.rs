//! Neo4j-backed `GraphStore` implementation over the Bolt protocol.

use chrono::Utc;
use neo4rs::{query, Graph};
use uuid::Uuid;

use crate::cso::{AssertionType, Visibility};
use crate::error::{AppError, AppResult};
use crate::graph::model::{
    AssertionForRevision, AssertionNode, GraphSlice, PublishedAssertion, ReactionEdge,
    ReactionType, RevisionMetadata,
};
use crate::graph::store::{DeleteOutcome, GraphStore, HomePage, ReactionOutcome};
use crate::pagination::HomeCursor;
use crate::viewer::Viewer;
use crate::cso::Cso;

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str, database: &str) -> AppResult<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| AppError::Internal(format!("neo4j connect failed: {e}")))?;
        let _ = database;
        Ok(Self { graph })
    }

    fn new_id(&self) -> String {
        format!("asn_{}", Uuid::now_v7())
    }

    /// Exposes the raw driver for startup-time schema setup.
    pub fn raw(&self) -> &Graph {
        &self.graph
    }
}

fn assertion_type_str(t: AssertionType) -> &'static str {
    match t {
        AssertionType::Moment => "moment",
        AssertionType::Note => "note",
        AssertionType::Article => "article",
        AssertionType::Artifact => "artifact",
        AssertionType::Response => "response",
        AssertionType::Curation => "curation",
        AssertionType::Tombstone => "tombstone",
    }
}

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "public",
        Visibility::Private => "private",
        Visibility::Followers => "followers",
        Visibility::Unlisted => "unlisted",
    }
}

impl GraphStore for Neo4jGraphStore {
    async fn publish(
        &self,
        viewer: &Viewer,
        cso: &Cso,
        supersedes_id: Option<&str>,
        revision_metadata: Option<&RevisionMetadata>,
    ) -> AppResult<PublishedAssertion> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        // 1. ensureIdentity(viewer) — coalesce semantics, never overwrite present values.
        txn.run(
            query(
                "MERGE (i:Identity {id: $id}) \
                 ON CREATE SET i.handle = null, i.displayName = null",
            )
            .param("id", viewer.user_id.clone()),
        )
        .await
        .map_err(|e| AppError::Graph(e.to_string()))?;

        // 3b. Reply-to-tombstone guard, checked in the same transaction as
        // the RESPONDS_TO edge it gates.
        let parent_ref = if cso.assertion_type == AssertionType::Response {
            cso.refs.first().map(|r| r.uri.clone())
        } else {
            None
        };

        if let Some(parent_id) = &parent_ref {
            let mut rows = txn
                .execute(
                    query(
                        "MATCH (p:Assertion {id: $parent}) \
                         OPTIONAL MATCH (t:Assertion {assertionType: 'tombstone', supersedesId: $parent}) \
                         RETURN p IS NOT NULL AS exists, t IS NOT NULL AS tombstoned",
                    )
                    .param("parent", parent_id.clone()),
                )
                .await
                .map_err(|e| AppError::Graph(e.to_string()))?;

            let row = rows
                .next(txn.handle())
                .await
                .map_err(|e| AppError::Graph(e.to_string()))?;

            match row {
                None => {
                    txn.rollback().await.ok();
                    return Err(AppError::NotFound(format!(
                        "parent assertion {parent_id} not found"
                    )));
                }
                Some(row) => {
                    let exists: bool = row.get("exists").unwrap_or(false);
                    let tombstoned: bool = row.get("tombstoned").unwrap_or(false);
                    if !exists {
                        txn.rollback().await.ok();
                        return Err(AppError::NotFound(format!(
                            "parent assertion {parent_id} not found"
                        )));
                    }
                    if tombstoned {
                        txn.rollback().await.ok();
                        return Err(AppError::Gone(
                            "reply target has been tombstoned".to_string(),
                        ));
                    }
                }
            }
        }

        let id = self.new_id();
        let now = Utc::now();
        let revision_number = revision_metadata.map(|r| r.revision_number as i64);
        let root_id = revision_metadata.map(|r| r.root_assertion_id.clone());
        let media: Vec<String> = cso.media.iter().map(|m| m.url.clone()).collect();

        // 2 + 4 (constraint race surfaces here as a uniqueness violation on
        // supersedesId when a concurrent revision wins first).
        let create_result = txn
            .run(
                query(
                    "CREATE (a:Assertion { \
                        id: $id, assertionType: $assertionType, text: $text, title: $title, \
                        visibility: $visibility, media: $media, createdAt: $createdAt, \
                        supersedesId: $supersedesId, revisionNumber: $revisionNumber, \
                        rootAssertionId: $rootAssertionId \
                     }) \
                     WITH a \
                     MATCH (author:Identity {id: $authorId}) \
                     MERGE (a)-[:AUTHORED_BY]->(author)",
                )
                .param("id", id.clone())
                .param("assertionType", assertion_type_str(cso.assertion_type))
                .param("text", cso.text.clone())
                .param("title", cso.title.clone())
                .param("visibility", visibility_str(cso.visibility))
                .param("media", media)
                .param("createdAt", now.to_rfc3339())
                .param("supersedesId", supersedes_id.map(|s| s.to_string()))
                .param("revisionNumber", revision_number)
                .param("rootAssertionId", root_id)
                .param("authorId", viewer.user_id.clone()),
            )
            .await;

        if let Err(e) = create_result {
            txn.rollback().await.ok();
            let message = e.to_string();
            if supersedes_id.is_some() && message.contains("ConstraintValidationFailed") {
                return Err(AppError::RevisionConflict(
                    "assertion has already been revised or deleted".to_string(),
                ));
            }
            return Err(AppError::Graph(message));
        }

        if let Some(parent_id) = &parent_ref {
            txn.run(
                query(
                    "MATCH (a:Assertion {id: $id}), (p:Assertion {id: $parent}) \
                     MERGE (a)-[:RESPONDS_TO]->(p)",
                )
                .param("id", id.clone())
                .param("parent", parent_id.clone()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        }

        for topic in &cso.topics {
            txn.run(
                query(
                    "MATCH (a:Assertion {id: $id}) \
                     MERGE (t:Topic {id: $topic}) \
                     MERGE (a)-[:TAGGED_WITH]->(t)",
                )
                .param("id", id.clone())
                .param("topic", topic.clone()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        }

        for mention in &cso.mentions {
            txn.run(
                query(
                    "MATCH (a:Assertion {id: $id}) \
                     MERGE (m:Identity {id: $mention}) \
                     MERGE (a)-[:MENTIONS]->(m)",
                )
                .param("id", id.clone())
                .param("mention", mention.clone()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        Ok(PublishedAssertion {
            assertion_id: id,
            created_at: now,
        })
    }

    async fn get_assertion_for_revision(
        &self,
        id: &str,
    ) -> AppResult<Option<AssertionForRevision>> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion {id: $id})-[:AUTHORED_BY]->(author:Identity) \
                     RETURN a.id AS id, author.id AS authorId, a.supersedesId AS supersedesId",
                )
                .param("id", id.to_string()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?
        {
            None => Ok(None),
            Some(row) => Ok(Some(AssertionForRevision {
                id: row.get("id").unwrap_or_default(),
                author_id: row.get("authorId").unwrap_or_default(),
                supersedes_id: row.get("supersedesId"),
            })),
        }
    }

    async fn get_revision_history(&self, id: &str) -> AppResult<Vec<AssertionNode>> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (origin:Assertion {id: $id}) \
                     WITH coalesce(origin.rootAssertionId, origin.id) AS rootId \
                     MATCH (a:Assertion)-[:AUTHORED_BY]->(author:Identity) \
                     WHERE a.id = rootId OR a.rootAssertionId = rootId \
                     RETURN a, author.id AS authorId \
                     ORDER BY a.createdAt ASC",
                )
                .param("id", id.to_string()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut history = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            history.push(row_to_assertion_node(&row)?);
        }
        Ok(history)
    }

    async fn delete_assertion(&self, id: &str, user_id: &str) -> AppResult<DeleteOutcome> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut rows = txn
            .execute(
                query(
                    "MATCH (a:Assertion {id: $id})-[:AUTHORED_BY]->(author:Identity) \
                     OPTIONAL MATCH (super:Assertion {supersedesId: $id}) \
                     RETURN author.id AS authorId, super.assertionType AS superType",
                )
                .param("id", id.to_string()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let row = rows
            .next(txn.handle())
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let row = match row {
            None => {
                txn.rollback().await.ok();
                return Err(AppError::NotFound(format!("assertion {id} not found")));
            }
            Some(row) => row,
        };

        let author_id: String = row.get("authorId").unwrap_or_default();
        if author_id != user_id {
            txn.rollback().await.ok();
            return Err(AppError::Forbidden(
                "only the author may delete this assertion".to_string(),
            ));
        }

        let super_type: Option<String> = row.get("superType");
        if let Some(super_type) = super_type {
            txn.rollback().await.ok();
            if super_type == "tombstone" {
                return Ok(DeleteOutcome::AlreadyDeleted);
            }
            return Err(AppError::Conflict(
                "assertion has already been superseded".to_string(),
            ));
        }

        let tombstone_id = self.new_id();
        let now = Utc::now();

        txn.run(
            query(
                "CREATE (t:Assertion { \
                    id: $tombId, assertionType: 'tombstone', text: '', title: null, \
                    visibility: 'public', media: [], createdAt: $createdAt, \
                    supersedesId: $id, revisionNumber: null, rootAssertionId: null \
                 }) \
                 WITH t \
                 MATCH (author:Identity {id: $authorId}) \
                 MERGE (t)-[:AUTHORED_BY]->(author)",
            )
            .param("tombId", tombstone_id)
            .param("id", id.to_string())
            .param("createdAt", now.to_rfc3339())
            .param("authorId", user_id.to_string()),
        )
        .await
        .map_err(|e| AppError::Graph(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        Ok(DeleteOutcome::Deleted)
    }

    async fn read_home_graph(&self, limit: u32, cursor: Option<HomeCursor>) -> AppResult<HomePage> {
        let (cursor_created_at, cursor_id) = match &cursor {
            Some(c) => (Some(c.created_at.to_rfc3339()), Some(c.id.clone())),
            None => (None, None),
        };

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion)-[:AUTHORED_BY]->(author:Identity) \
                     WHERE NOT (a)-[:RESPONDS_TO]->() AND a.assertionType <> 'response' \
                       AND a.assertionType <> 'tombstone' \
                       AND NOT EXISTS { MATCH (:Assertion {supersedesId: a.id}) } \
                       AND ($cursorCreatedAt IS NULL OR a.createdAt < $cursorCreatedAt \
                            OR (a.createdAt = $cursorCreatedAt AND a.id < $cursorId)) \
                     RETURN a, author.id AS authorId \
                     ORDER BY a.createdAt DESC, a.id DESC \
                     LIMIT $limit",
                )
                .param("cursorCreatedAt", cursor_created_at)
                .param("cursorId", cursor_id)
                .param("limit", (limit + 1) as i64),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut assertions = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            assertions.push(row_to_assertion_node(&row)?);
        }

        let next_cursor = if assertions.len() as u32 > limit {
            assertions.truncate(limit as usize);
            assertions.last().map(|a| HomeCursor {
                created_at: a.created_at,
                id: a.id.clone(),
            })
        } else {
            None
        };

        let root_ids: Vec<String> = assertions.iter().map(|a| a.id.clone()).collect();
        let slice = self.fetch_slice_for_roots(&root_ids).await?;

        Ok(HomePage { slice, next_cursor })
    }

    async fn read_thread_graph(&self, root_id: &str) -> AppResult<GraphSlice> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (root:Assertion {id: $rootId}) \
                     MATCH path = (reply:Assertion)-[:RESPONDS_TO*0..]->(root) \
                     WHERE reply.assertionType <> 'tombstone' \
                     WITH DISTINCT reply \
                     MATCH (reply)-[:AUTHORED_BY]->(author:Identity) \
                     RETURN reply AS a, author.id AS authorId",
                )
                .param("rootId", root_id.to_string()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut assertions = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            assertions.push(row_to_assertion_node(&row)?);
        }

        let ids: Vec<String> = assertions.iter().map(|a| a.id.clone()).collect();
        let mut slice = self.fetch_edges_for_ids(&ids).await?;
        slice.assertions = assertions;
        Ok(slice)
    }

    async fn add_reaction(
        &self,
        user_id: &str,
        assertion_id: &str,
        reaction_type: ReactionType,
    ) -> AppResult<ReactionOutcome> {
        let type_str = match reaction_type {
            ReactionType::Like => "like",
            ReactionType::Acknowledge => "acknowledge",
        };

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion {id: $id})-[:AUTHORED_BY]->(author:Identity) \
                     OPTIONAL MATCH (super:Assertion {supersedesId: $id}) \
                     RETURN a.assertionType AS assertionType, a.visibility AS visibility, \
                            author.id AS authorId, super IS NOT NULL AS superseded",
                )
                .param("id", assertion_id.to_string()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("assertion {assertion_id} not found")))?;

        let assertion_type: String = row.get("assertionType").unwrap_or_default();
        let visibility: String = row.get("visibility").unwrap_or_default();
        let author_id: String = row.get("authorId").unwrap_or_default();
        let superseded: bool = row.get("superseded").unwrap_or(false);

        if assertion_type == "tombstone" {
            return Err(AppError::Conflict("assertion is tombstoned".to_string()));
        }
        if superseded {
            return Err(AppError::Conflict("assertion has been superseded".to_string()));
        }
        if visibility != "public" && author_id != user_id {
            return Err(AppError::Forbidden(
                "cannot react to a non-public assertion you do not own".to_string(),
            ));
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MERGE (i:Identity {id: $userId}) \
                     WITH i \
                     MATCH (a:Assertion {id: $assertionId}) \
                     MERGE (i)-[r:REACTED_TO {type: $type}]->(a) \
                     ON CREATE SET r.createdAt = $createdAt, r.fresh = true \
                     ON MATCH SET r.fresh = false \
                     RETURN r.fresh AS fresh",
                )
                .param("userId", user_id.to_string())
                .param("assertionId", assertion_id.to_string())
                .param("type", type_str)
                .param("createdAt", Utc::now().to_rfc3339()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let fresh: bool = rows
            .next()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?
            .and_then(|r| r.get("fresh"))
            .unwrap_or(false);

        Ok(if fresh {
            ReactionOutcome::Added
        } else {
            ReactionOutcome::AlreadyPresent
        })
    }

    async fn remove_reaction(
        &self,
        user_id: &str,
        assertion_id: &str,
        reaction_type: ReactionType,
    ) -> AppResult<bool> {
        let type_str = match reaction_type {
            ReactionType::Like => "like",
            ReactionType::Acknowledge => "acknowledge",
        };

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (i:Identity {id: $userId})-[r:REACTED_TO {type: $type}]->(a:Assertion {id: $assertionId}) \
                     DELETE r \
                     RETURN count(r) AS removed",
                )
                .param("userId", user_id.to_string())
                .param("assertionId", assertion_id.to_string())
                .param("type", type_str),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let removed: i64 = rows
            .next()
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?
            .and_then(|r| r.get("removed"))
            .unwrap_or(0);

        Ok(removed > 0)
    }

    async fn get_reactions_for_assertion(
        &self,
        assertion_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<ReactionEdge>> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (i:Identity)-[r:REACTED_TO]->(a:Assertion {id: $id}) \
                     RETURN i.id AS identityId, r.type AS type, r.createdAt AS createdAt",
                )
                .param("id", assertion_id.to_string()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut reactions = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            let identity_id: String = row.get("identityId").unwrap_or_default();
            let type_str: String = row.get("type").unwrap_or_default();
            let created_at: String = row.get("createdAt").unwrap_or_default();
            let Some(reaction_type) = ReactionType::parse(&type_str) else {
                continue;
            };
            let Ok(created_at) = chrono::DateTime::parse_from_rfc3339(&created_at) else {
                continue;
            };
            reactions.push(ReactionEdge {
                identity_id,
                assertion_id: assertion_id.to_string(),
                reaction_type,
                created_at: created_at.with_timezone(&Utc),
            });
        }

        let _ = viewer_id;
        Ok(reactions)
    }
}

impl Neo4jGraphStore {
    async fn fetch_slice_for_roots(&self, root_ids: &[String]) -> AppResult<GraphSlice> {
        if root_ids.is_empty() {
            return Ok(GraphSlice::default());
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (root:Assertion)-[:RESPONDS_TO]-(reply:Assertion) \
                     WHERE root.id IN $rootIds AND reply.assertionType <> 'tombstone' \
                     MATCH (reply)-[:AUTHORED_BY]->(author:Identity) \
                     RETURN reply AS a, author.id AS authorId",
                )
                .param("rootIds", root_ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut assertions = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            assertions.push(row_to_assertion_node(&row)?);
        }

        let mut all_ids = root_ids.to_vec();
        all_ids.extend(assertions.iter().map(|a| a.id.clone()));
        let mut slice = self.fetch_edges_for_ids(&all_ids).await?;

        let root_nodes = self.fetch_nodes_by_ids(root_ids).await?;
        assertions.splice(0..0, root_nodes);
        slice.assertions = assertions;
        Ok(slice)
    }

    async fn fetch_nodes_by_ids(&self, ids: &[String]) -> AppResult<Vec<AssertionNode>> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion)-[:AUTHORED_BY]->(author:Identity) \
                     WHERE a.id IN $ids \
                     RETURN a, author.id AS authorId",
                )
                .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            nodes.push(row_to_assertion_node(&row)?);
        }
        Ok(nodes)
    }

    /// Derives `SUPERSEDES`/`TAGGED_WITH`/`MENTIONS`/`REACTED_TO` slices for
    /// a known set of assertion ids — used to flesh out a node set already
    /// fetched by `read_home_graph`/`read_thread_graph`.
    async fn fetch_edges_for_ids(&self, ids: &[String]) -> AppResult<GraphSlice> {
        let mut slice = GraphSlice::default();
        if ids.is_empty() {
            return Ok(slice);
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (new:Assertion)-[:AUTHORED_BY]->() \
                     WHERE new.supersedesId IN $ids \
                     RETURN new.id AS newId, new.supersedesId AS oldId",
                )
                .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            let new_id: String = row.get("newId").unwrap_or_default();
            let old_id: String = row.get("oldId").unwrap_or_default();
            slice.supersedes.push((new_id, old_id));
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion)-[:RESPONDS_TO]->(p:Assertion) \
                     WHERE a.id IN $ids \
                     RETURN a.id AS child, p.id AS parent",
                )
                .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            slice.responds_to.push((
                row.get("child").unwrap_or_default(),
                row.get("parent").unwrap_or_default(),
            ));
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion)-[:TAGGED_WITH]->(t:Topic) \
                     WHERE a.id IN $ids \
                     RETURN a.id AS assertionId, t.id AS topic",
                )
                .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            slice.tagged_with.push((
                row.get("assertionId").unwrap_or_default(),
                row.get("topic").unwrap_or_default(),
            ));
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (a:Assertion)-[:MENTIONS]->(m:Identity) \
                     WHERE a.id IN $ids \
                     RETURN a.id AS assertionId, m.id AS identityId",
                )
                .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            slice.mentions.push((
                row.get("assertionId").unwrap_or_default(),
                row.get("identityId").unwrap_or_default(),
            ));
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (i:Identity)-[r:REACTED_TO]->(a:Assertion) \
                     WHERE a.id IN $ids \
                     RETURN i.id AS identityId, a.id AS assertionId, r.type AS type, r.createdAt AS createdAt",
                )
                .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| AppError::Graph(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(|e| AppError::Graph(e.to_string()))? {
            let type_str: String = row.get("type").unwrap_or_default();
            let Some(reaction_type) = ReactionType::parse(&type_str) else {
                continue;
            };
            let created_at: String = row.get("createdAt").unwrap_or_default();
            let Ok(created_at) = chrono::DateTime::parse_from_rfc3339(&created_at) else {
                continue;
            };
            slice.reactions.push(ReactionEdge {
                identity_id: row.get("identityId").unwrap_or_default(),
                assertion_id: row.get("assertionId").unwrap_or_default(),
                reaction_type,
                created_at: created_at.with_timezone(&Utc),
            });
        }

        Ok(slice)
    }
}

fn row_to_assertion_node(row: &neo4rs::Row) -> AppResult<AssertionNode> {
    let node: neo4rs::Node = row
        .get("a")
        .map_err(|e| AppError::Graph(format!("malformed assertion row: {e}")))?;

    let assertion_type = match node.get::<String>("assertionType").unwrap_or_default().as_str() {
        "moment" => AssertionType::Moment,
        "note" => AssertionType::Note,
        "article" => AssertionType::Article,
        "artifact" => AssertionType::Artifact,
        "response" => AssertionType::Response,
        "curation" => AssertionType::Curation,
        _ => AssertionType::Tombstone,
    };

    let visibility = match node.get::<String>("visibility").unwrap_or_default().as_str() {
        "private" => Visibility::Private,
        "followers" => Visibility::Followers,
        "unlisted" => Visibility::Unlisted,
        _ => Visibility::Public,
    };

    let created_at_raw: String = node.get("createdAt").unwrap_or_default();
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(AssertionNode {
        id: node.get("id").unwrap_or_default(),
        assertion_type,
        text: node.get("text").unwrap_or_default(),
        title: node.get("title"),
        visibility,
        media: node.get("media").unwrap_or_default(),
        created_at,
        author_id: row.get("authorId").unwrap_or_default(),
        supersedes_id: node.get("supersedesId"),
        revision_number: node.get::<i64>("revisionNumber").ok().map(|n| n as u32),
        root_assertion_id: node.get("rootAssertionId"),
    })
}
