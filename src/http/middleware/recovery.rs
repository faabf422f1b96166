//! Panic recovery boundary.
//!
//! # Responsibilities
//! - Catch a panic raised anywhere below the boundary while the request is
//!   being handled
//! - Normalize the panic payload into a [`PanicError`]
//! - Log it once with the request ID and the stack trace of the panic site
//! - Answer `500 {"error":"Internal Server Error"}`
//!
//! # Design Decisions
//! - Two instances: the outer one sits above request ID assignment, the inner
//!   one below it so handler panics are attributed to a request ID
//! - A panic unwinds out of `poll` before any `Response` exists, so the error
//!   response can never collide with one already sent
//! - The stack trace is captured by a panic hook on the panicking thread; the
//!   hook stays silent for panics inside a boundary and defers to the previous
//!   hook everywhere else

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::http::middleware::access_log;
use crate::http::request::request_id_of;

thread_local! {
    static BOUNDARY_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
    static PANIC_CLEANUP: Cell<bool> = const { Cell::new(false) };
}

static PANIC_HOOK: Once = Once::new();

/// A recovered panic, normalized to an error.
#[derive(Debug, Error)]
pub enum PanicError {
    /// The panic carried a string message.
    #[error("{0}")]
    Message(String),

    /// The panic carried an error value.
    #[error("{0}")]
    Error(Box<dyn std::error::Error + Send + Sync>),

    /// Any other payload. Only common primitives keep their value; anything
    /// else has no textual form to recover and reads `<opaque payload>`.
    #[error("unknown panic: {0}")]
    Unknown(String),
}

impl PanicError {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Self::Message(*message),
            Err(other) => other,
        };
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return Self::Message((*message).to_string()),
            Err(other) => other,
        };
        match payload.downcast::<Box<dyn std::error::Error + Send + Sync>>() {
            Ok(error) => Self::Error(*error),
            Err(other) => Self::Unknown(describe(other.as_ref())),
        }
    }
}

fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(v) = payload.downcast_ref::<i32>() {
        v.to_string()
    } else if let Some(v) = payload.downcast_ref::<i64>() {
        v.to_string()
    } else if let Some(v) = payload.downcast_ref::<u32>() {
        v.to_string()
    } else if let Some(v) = payload.downcast_ref::<u64>() {
        v.to_string()
    } else if let Some(v) = payload.downcast_ref::<usize>() {
        v.to_string()
    } else if let Some(v) = payload.downcast_ref::<bool>() {
        v.to_string()
    } else if let Some(v) = payload.downcast_ref::<char>() {
        v.to_string()
    } else {
        "<opaque payload>".to_string()
    }
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if BOUNDARY_DEPTH.with(Cell::get) > 0 {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// True while a boundary is dropping the future that panicked.
pub fn in_panic_cleanup() -> bool {
    PANIC_CLEANUP.with(Cell::get)
}

/// What a [`CatchPanic`] future resolves to when the inner future panicked.
pub struct CaughtPanic {
    pub payload: Box<dyn Any + Send>,
    pub stack_trace: String,
}

/// Polls a response future inside an unwind boundary.
pub struct CatchPanic {
    inner: Option<Pin<Box<dyn Future<Output = Response> + Send>>>,
}

impl CatchPanic {
    pub fn new<F>(inner: F) -> Self
    where
        F: Future<Output = Response> + Send + 'static,
    {
        install_panic_hook();
        Self {
            inner: Some(Box::pin(inner)),
        }
    }
}

impl Future for CatchPanic {
    type Output = Result<Response, CaughtPanic>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Pending;
        };

        BOUNDARY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let polled = panic::catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx)));
        BOUNDARY_DEPTH.with(|depth| depth.set(depth.get() - 1));

        match polled {
            Ok(Poll::Ready(response)) => {
                this.inner = None;
                Poll::Ready(Ok(response))
            }
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => {
                // Whatever the unwind left alive is released here, flagged so
                // stages below can tell it apart from a cancelled request.
                PANIC_CLEANUP.with(|flag| flag.set(true));
                drop(this.inner.take());
                PANIC_CLEANUP.with(|flag| flag.set(false));

                let stack_trace = PANIC_TRACE
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| Backtrace::force_capture().to_string());
                Poll::Ready(Err(CaughtPanic {
                    payload,
                    stack_trace,
                }))
            }
        }
    }
}

/// Fixed response for any recovered fault.
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

/// Outer boundary, placed above request ID assignment.
pub async fn recover_outer(request: Request, next: Next) -> Response {
    recover(request, next).await
}

/// Inner boundary, placed below request ID assignment and above every
/// user-defined middleware.
pub async fn recover_inner(request: Request, next: Next) -> Response {
    recover(request, next).await
}

async fn recover(request: Request, next: Next) -> Response {
    let request_id = request_id_of(&request);

    match CatchPanic::new(next.run(request)).await {
        Ok(response) => response,
        Err(caught) => {
            let error = PanicError::from_payload(caught.payload);

            tracing::error!(
                request_id = request_id.as_deref(),
                error = %error,
                stack_trace = %caught.stack_trace,
                "Recovered from panic"
            );

            access_log::attach_unwound(internal_error_response())
        }
    }
}
