pub mod model;
pub mod neo4j_store;
pub mod schema;
pub mod store;

#[cfg(test)]
pub mod fake;

pub use model::GraphSlice;
pub use neo4j_store::Neo4jGraphStore;
pub use store::{DeleteOutcome, GraphStore, HomePage, ReactionOutcome};
