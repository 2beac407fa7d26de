//! Shared application state, built the way the teacher's examples wire a
//! concrete `AppState` rather than the generic `AppState<T>` the library
//! crate exposes for embedders.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::delivery::DeliveryRegistry;
use crate::drafts::PgDraftStore;
use crate::graph::neo4j_store::Neo4jGraphStore;
use crate::idempotency::PgIdempotencyStore;
use crate::jobs::JobRunner;
use crate::notify::{PgNotificationRepository, PgOutboxRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub graph: Arc<Neo4jGraphStore>,
    pub idempotency: Arc<PgIdempotencyStore>,
    pub notifications: Arc<PgNotificationRepository>,
    pub outbox: Arc<PgOutboxRepository>,
    pub drafts: Arc<PgDraftStore>,
    pub jobs: Arc<JobRunner>,
    pub delivery: DeliveryRegistry,
}

impl AppState {
    pub fn new(config: Config, db_pool: PgPool, graph: Neo4jGraphStore) -> Self {
        Self {
            config: Arc::new(config),
            graph: Arc::new(graph),
            idempotency: Arc::new(PgIdempotencyStore::new(db_pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(db_pool.clone())),
            outbox: Arc::new(PgOutboxRepository::new(db_pool.clone())),
            drafts: Arc::new(PgDraftStore::new(db_pool.clone())),
            jobs: Arc::new(JobRunner::new(db_pool)),
            delivery: DeliveryRegistry::new(),
        }
    }
}
