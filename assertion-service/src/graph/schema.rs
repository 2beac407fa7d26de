//! Startup-time constraint creation, mirroring the eager-prepare step
//! `acton_service::database::create_pool` performs for relational backends.

use neo4rs::{query, Graph};

use crate::error::{AppError, AppResult};

const CONSTRAINTS: &[&str] = &[
    "CREATE CONSTRAINT assertion_id_unique IF NOT EXISTS \
     FOR (a:Assertion) REQUIRE a.id IS UNIQUE",
    "CREATE CONSTRAINT identity_id_unique IF NOT EXISTS \
     FOR (i:Identity) REQUIRE i.id IS UNIQUE",
    "CREATE CONSTRAINT topic_id_unique IF NOT EXISTS \
     FOR (t:Topic) REQUIRE t.id IS UNIQUE",
    "CREATE CONSTRAINT assertion_supersedes_unique IF NOT EXISTS \
     FOR (a:Assertion) REQUIRE a.supersedesId IS UNIQUE",
];

pub async fn ensure_constraints(graph: &Graph) -> AppResult<()> {
    for stmt in CONSTRAINTS {
        graph
            .run(query(stmt))
            .await
            .map_err(|e| AppError::Internal(format!("failed to create constraint: {e}")))?;
    }
    Ok(())
}
