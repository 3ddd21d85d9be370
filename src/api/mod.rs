pub mod handlers;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .route("/health", get(handlers::health_check))
        .route("/crawl", post(handlers::start_crawl))
        .route(
            "/crawl/{id}",
            get(handlers::crawl_status).delete(handlers::cancel_crawl),
        )
        .route("/crawl/{id}/events", get(handlers::crawl_events))
        .route("/crawl/{id}/finalize", post(handlers::finalize_crawl))
        .route("/programs/extract", post(handlers::extract_programs))
        .route(
            "/colleges/{id}/relink-programs",
            post(handlers::relink_programs),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
