//! Request logger injection.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::http::context::RequestContext;
use crate::http::request::request_id_of;

/// Attach a [`RequestContext`] carrying a freshly derived logger to the
/// request and run the rest of the chain inside its span.
pub async fn inject_request_logger(mut request: Request, next: Next) -> Response {
    let request_id = request_id_of(&request).unwrap_or_default();
    let context = RequestContext::new(request_id);
    let span = context.logger().clone();

    request.extensions_mut().insert(context);

    next.run(request).instrument(span).await
}
