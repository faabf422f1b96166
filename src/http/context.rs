//! Request-scoped context.
//!
//! A [`RequestContext`] is created by the logger injection stage, stored in the
//! request extensions, and read by every later stage and handler. It lives for
//! exactly one request.

use std::sync::Arc;

use tracing::Span;

/// Request identifier plus the logger derived for it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Arc<str>,
    logger: Span,
}

impl RequestContext {
    /// Derive a request-scoped logger from the current sink, annotated with
    /// `request_id`.
    pub fn new(request_id: impl Into<Arc<str>>) -> Self {
        let request_id = request_id.into();
        let logger = tracing::info_span!("request", request_id = %request_id);
        Self { request_id, logger }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The span every event for this request should be recorded under.
    pub fn logger(&self) -> &Span {
        &self.logger
    }
}
