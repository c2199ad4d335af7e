//! API route definitions

use axum::routing::{delete, get, post, put};
use axum::Router;

use super::handlers;
use super::server::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/status", get(handlers::health::status))
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Proxy configs
        .route("/proxies", get(handlers::proxy::list_proxies))
        .route("/proxies", post(handlers::proxy::create_proxy))
        .route("/proxies/:id", get(handlers::proxy::get_proxy))
        .route("/proxies/:id", put(handlers::proxy::update_proxy))
        .route("/proxies/:id", delete(handlers::proxy::delete_proxy))
        .route("/proxies/:id/toggle", post(handlers::proxy::toggle_proxy))
        // Rules
        .route("/rules", get(handlers::rule::list_rules))
        .route("/rules", post(handlers::rule::create_rule))
        .route("/rules/:id", get(handlers::rule::get_rule))
        .route("/rules/:id", put(handlers::rule::update_rule))
        .route("/rules/:id", delete(handlers::rule::delete_rule))
        .route(
            "/rules/:id/priority",
            put(handlers::rule::update_rule_priority),
        )
        // Routing
        .route("/route/decide", post(handlers::route::decide_route))
        // Connections
        .route("/connections", get(handlers::connection::list_connections))
        .route("/connections", post(handlers::connection::open_connection))
        .route(
            "/connections/stats",
            get(handlers::connection::connection_stats),
        )
        .route(
            "/connections/evict",
            post(handlers::connection::evict_connections),
        )
        .route("/connections/:id", get(handlers::connection::get_connection))
        .route(
            "/connections/:id/state",
            post(handlers::connection::report_state),
        )
        .route(
            "/connections/:id/reopen",
            post(handlers::connection::reopen_connection),
        )
}
