//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → middleware chain (http::middleware::apply)
//!     → router.rs (exact path lookup)
//!     → handler, or 404 fallback
//! ```
//!
//! # Design Decisions
//! - Routes are fixed at startup, immutable at runtime
//! - Exact paths only, no parameters or wildcards
//! - The fallback runs inside the middleware chain, so 404s are logged and
//!   carry a request ID like any other response

pub mod router;

pub use router::{build_router, build_router_for, routes};
