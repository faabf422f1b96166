//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (listener ownership, start / graceful shutdown)
//!     → middleware/ (recovery, request ID, request logger, access log)
//!     → routing (exact method + path dispatch)
//!     → handlers.rs
//! ```

pub mod context;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use context::RequestContext;
pub use request::{request_id_of, UuidRequestId, X_REQUEST_ID};
pub use server::{HttpServer, ServerError, ServerErrors, ServerState, ShutdownError};
