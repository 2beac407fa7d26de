//! HTTP boundary: route table and middleware stack, assembled the way
//! the teacher's `create_http_router` wires `ServiceBuilder` layers over
//! a plain `Router` (spec.md's surface has no API versioning, so this
//! skips `VersionedApiBuilder`).

mod delete;
mod health;
mod history;
mod home;
mod publish;
mod reactions;
mod thread;
mod ws;

use acton_service::middleware::request_tracking::{request_id_layer, request_id_propagation_layer};
use axum::{
    routing::{delete as http_delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::config::Config;
use crate::state::AppState;

pub fn create_http_router(state: AppState, config: &Config) -> Router {
    let cors = match &config.service.frontend_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<axum::http::HeaderValue>()
                    .expect("frontend_origin must be a valid header value"),
            )
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        None => CorsLayer::permissive(),
    };

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/publish", post(publish::publish))
        .route("/home", get(home::home))
        .route("/thread/{id}", get(thread::thread))
        .route("/assertions/{id}/history", get(history::history))
        .route("/assertions/{id}", http_delete(delete::delete_assertion))
        .route(
            "/reactions",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .route("/reactions/{assertionId}", get(reactions::reaction_counts))
        .route("/health/jobs", get(health::job_health))
        .route("/ws/notifications", get(ws::ws_notifications))
        .with_state(state);

    app.layer(
        ServiceBuilder::new()
            .layer(request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request_id_propagation_layer())
            .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
            .layer(CompressionLayer::new())
            .layer(cors),
    )
}
