//! Route table.

use axum::routing::get;
use axum::Router;

use crate::config::ServerConfig;
use crate::http::{handlers, middleware, UuidRequestId};

/// The bare route table, without middleware.
pub fn routes() -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::health_check))
        .route("/panic", get(handlers::trigger_panic))
        .fallback(handlers::not_found)
}

/// The route table wrapped in the full middleware chain, with default settings.
pub fn build_router() -> Router {
    middleware::apply(routes())
}

/// The route table wrapped in the middleware chain configured by `config`.
pub fn build_router_for(config: &ServerConfig) -> Router {
    middleware::apply_with(
        routes(),
        UuidRequestId,
        config.request_timeout.as_duration(),
    )
}
