//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Read the assigned ID back out of a request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A non-blank inbound `x-request-id` is kept as-is and echoed back
//! - A blank one is dropped so a fresh ID is generated

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request identifier in both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Remove an empty or whitespace-only `x-request-id` so the ID stage treats
/// the request as carrying none.
pub async fn discard_blank_request_id(mut request: Request<Body>, next: Next) -> Response {
    if request
        .headers()
        .get(X_REQUEST_ID)
        .is_some_and(|value| value.as_bytes().iter().all(u8::is_ascii_whitespace))
    {
        request.headers_mut().remove(X_REQUEST_ID);
    }

    next.run(request).await
}

/// The identifier assigned to `request`, if the ID stage has run.
pub fn request_id_of<B>(request: &Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_ids() {
        let request = Request::new(());
        let mut make = UuidRequestId;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert!(Uuid::parse_str(a.header_value().to_str().unwrap()).is_ok());
    }

    #[test]
    fn reads_assigned_id() {
        let mut request = Request::new(());
        assert_eq!(request_id_of(&request), None);

        request
            .extensions_mut()
            .insert(RequestId::new(HeaderValue::from_static("abc")));
        assert_eq!(request_id_of(&request).as_deref(), Some("abc"));
    }
}
