use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{diagnostics, handlers, items, orchestrator, settings, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Items
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/counts", get(items::get_counts))
        .route("/items/reset-failed", post(items::reset_all_failed))
        .route("/items/{name}", get(items::get_item))
        .route("/items/{name}/ready", post(items::mark_ready))
        .route("/items/{name}/requeue", post(items::requeue_item))
        .route("/items/{name}/reset", post(items::reset_item))
        // Settings and run switch
        .route("/settings", get(settings::get_settings))
        .route("/settings/{key}", put(settings::put_setting))
        .route("/system/start", post(settings::start_system))
        .route("/system/stop", post(settings::stop_system))
        // Error log
        .route("/errors", get(diagnostics::list_errors))
        .route("/errors/stats", get(diagnostics::get_stats))
        // Orchestrator
        .route("/orchestrator/status", get(orchestrator::get_status))
        // Live events
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
