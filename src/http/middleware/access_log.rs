//! Access logging.
//!
//! # Responsibilities
//! - Observe method, path, remote address and start time on the way in
//! - Observe status on the way out
//! - Count body bytes as they are written
//! - Emit exactly one "HTTP request" event once the body is finished
//!
//! # Design Decisions
//! - The event fires from the response body, not the middleware, so bytes and
//!   duration cover the full write
//! - Dropping an unfinished body (client went away, HEAD, empty body) still
//!   emits the event
//! - A request whose handler panicked parks its record on the unwinding thread;
//!   the recovery boundary attaches it to the 500 response it writes
//! - A request dropped before the handler returned is logged with status 499

use std::cell::RefCell;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::http::context::RequestContext;
use crate::http::middleware::recovery;
use crate::observability::metrics;

/// Status logged for requests abandoned before a response existed.
const CLIENT_CLOSED_REQUEST: u16 = 499;

thread_local! {
    static UNWOUND: RefCell<Option<AccessRecord>> = const { RefCell::new(None) };
}

/// Wrap the response body so the access log is emitted when it completes.
pub async fn log_access(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut pending = PendingAccess(Some(AccessRecord {
        method: request.method().clone(),
        path: request.uri().path().to_owned(),
        remote,
        started: Instant::now(),
        context: request.extensions().get::<RequestContext>().cloned(),
    }));

    let response = next.run(request).await;

    match pending.0.take() {
        Some(record) => attach(response, record),
        None => response,
    }
}

/// Attach the record parked by a panicking request, if any, to `response`.
pub(crate) fn attach_unwound(response: Response) -> Response {
    match UNWOUND.with(|slot| slot.borrow_mut().take()) {
        Some(record) => attach(response, record),
        None => response,
    }
}

fn attach(response: Response, record: AccessRecord) -> Response {
    let (parts, body) = response.into_parts();
    let status = parts.status.as_u16();
    Response::from_parts(parts, Body::new(AccessLogBody::new(body, status, record)))
}

struct AccessRecord {
    method: Method,
    path: String,
    remote: String,
    started: Instant,
    context: Option<RequestContext>,
}

impl AccessRecord {
    fn emit(self, status: u16, bytes: u64) {
        let duration = self.started.elapsed();
        let request_id = self.context.as_ref().map(RequestContext::request_id);
        let parent = self.context.as_ref().and_then(|c| c.logger().id());

        tracing::info!(
            parent: parent,
            request_id,
            method = %self.method,
            path = %self.path,
            status,
            bytes,
            duration_ms = duration.as_secs_f64() * 1000.0,
            remote = %self.remote,
            "HTTP request"
        );

        metrics::record_request(self.method.as_str(), status, duration);
    }
}

/// Holds the record while the downstream chain runs.
struct PendingAccess(Option<AccessRecord>);

impl Drop for PendingAccess {
    fn drop(&mut self) {
        let Some(record) = self.0.take() else {
            return;
        };

        if std::thread::panicking() || recovery::in_panic_cleanup() {
            UNWOUND.with(|slot| *slot.borrow_mut() = Some(record));
        } else {
            record.emit(CLIENT_CLOSED_REQUEST, 0);
        }
    }
}

/// Response body that counts bytes and emits the access log once.
pub struct AccessLogBody {
    inner: Body,
    status: u16,
    bytes: u64,
    record: Option<AccessRecord>,
}

impl AccessLogBody {
    fn new(inner: Body, status: u16, record: AccessRecord) -> Self {
        Self {
            inner,
            status,
            bytes: 0,
            record: Some(record),
        }
    }

    fn finish(&mut self) {
        if let Some(record) = self.record.take() {
            record.emit(self.status, self.bytes);
        }
    }
}

impl HttpBody for AccessLogBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                }
                if this.inner.is_end_stream() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for AccessLogBody {
    fn drop(&mut self) {
        self.finish();
    }
}
