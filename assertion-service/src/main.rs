use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use assertion_service::config::Config;
use assertion_service::delivery::outbox_worker;
use assertion_service::graph::neo4j_store::Neo4jGraphStore;
use assertion_service::graph::schema;
use assertion_service::http::create_http_router;
use assertion_service::state::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.service.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting assertion-service on port {}",
        config.service.port
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(StdDuration::from_secs(config.database.connection_timeout_secs))
        .connect(&config.database.url)
        .await?;

    let graph = Neo4jGraphStore::connect(
        &config.graph.uri,
        &config.graph.user,
        &config.graph.password,
        &config.graph.database,
    )
    .await?;
    schema::ensure_constraints(graph.raw()).await?;

    let state = AppState::new(config.clone(), db_pool, graph);

    let (outbox_stop_tx, outbox_stop_rx) = tokio::sync::mpsc::channel(1);
    let outbox_handle = tokio::spawn(outbox_worker::run(
        state.notifications.clone(),
        state.outbox.clone(),
        state.delivery.clone(),
        outbox_stop_rx,
    ));

    let (jobs_stop_tx, jobs_stop_rx) = tokio::sync::mpsc::channel(1);
    let jobs_handle = spawn_cleanup_jobs(state.clone(), jobs_stop_rx);

    let app = create_http_router(state.clone(), &config);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.service.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("assertion-service listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down: draining websocket connections");
    state.delivery.close_all().await;
    let _ = outbox_stop_tx.send(()).await;
    let _ = outbox_handle.await;
    let _ = jobs_stop_tx.send(()).await;
    let _ = jobs_handle.await;

    tracing::info!("assertion-service stopped gracefully");
    Ok(())
}

/// Spawns the three scheduled maintenance loops named in C9: draft,
/// idempotency, and outbox cleanup. `tokio::time::interval`'s first tick
/// fires immediately, matching "run on boot, then every T". Torn down the
/// same way as the outbox worker: a stop signal breaks the `select!` loop
/// instead of `abort`ing it mid-cleanup.
fn spawn_cleanup_jobs(
    state: AppState,
    mut stop: tokio::sync::mpsc::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let draft_period = StdDuration::from_secs(state.config.jobs.draft_cleanup_interval_hours * 3600);
        let idempotency_period =
            StdDuration::from_secs(state.config.jobs.idempotency_cleanup_interval_hours * 3600);
        let outbox_period = StdDuration::from_secs(state.config.jobs.outbox_cleanup_interval_hours * 3600);

        let mut draft_tick = tokio::time::interval(draft_period);
        let mut idempotency_tick = tokio::time::interval(idempotency_period);
        let mut outbox_tick = tokio::time::interval(outbox_period);

        loop {
            tokio::select! {
                _ = draft_tick.tick() => {
                    let drafts = state.drafts.clone();
                    state.jobs.run_tracked("draft_cleanup", || async move {
                        drafts.cleanup_stale(72).await.map_err(Into::into)
                    }).await;
                }
                _ = idempotency_tick.tick() => {
                    let idempotency = state.idempotency.clone();
                    state.jobs.run_tracked("idempotency_cleanup", || async move {
                        use assertion_service::idempotency::IdempotencyStore;
                        idempotency.cleanup_expired().await.map_err(Into::into)
                    }).await;
                }
                _ = outbox_tick.tick() => {
                    let outbox = state.outbox.clone();
                    state.jobs.run_tracked("outbox_cleanup", || async move {
                        outbox.cleanup_terminal(168).await.map_err(Into::into)
                    }).await;
                }
                _ = stop.recv() => {
                    tracing::info!("cleanup jobs received stop signal");
                    break;
                }
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM signal");
        }
    }
}
