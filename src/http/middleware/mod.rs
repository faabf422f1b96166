//! Request middleware chain.
//!
//! # Data Flow
//! ```text
//! request
//!     → recovery (outer)       catches panics from the ID stage itself
//!     → blank ID removal       an empty inbound x-request-id counts as absent
//!     → request ID             assign x-request-id, echo it on the response
//!     → recovery (inner)       catches panics from everything below
//!     → request_logger         RequestContext { request_id, span }
//!     → access_log             one "HTTP request" event per request
//!     → timeout                408 once the request timeout elapses
//!     → router / handler
//! ```

pub mod access_log;
pub mod recovery;
pub mod request_logger;

use std::time::Duration;

use axum::{middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::http::request::{discard_blank_request_id, UuidRequestId};

pub use access_log::log_access;
pub use recovery::{internal_error_response, recover_inner, recover_outer, PanicError};
pub use request_logger::inject_request_logger;

/// Wrap every route of `router`, fallback included, in the middleware chain
/// with UUID request IDs and the default request timeout.
pub fn apply(router: Router) -> Router {
    apply_with(router, UuidRequestId, DEFAULT_REQUEST_TIMEOUT)
}

/// Wrap `router` in the middleware chain, generating request IDs with
/// `make_id` and answering 408 after `request_timeout`.
pub fn apply_with<M>(router: Router, make_id: M, request_timeout: Duration) -> Router
where
    M: MakeRequestId + Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn(recover_outer))
            .layer(from_fn(discard_blank_request_id))
            .layer(SetRequestIdLayer::x_request_id(make_id))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(from_fn(recover_inner))
            .layer(from_fn(inject_request_logger))
            .layer(from_fn(log_access))
            .layer(TimeoutLayer::new(request_timeout)),
    )
}
