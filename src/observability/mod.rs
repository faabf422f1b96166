//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main → logging.rs (sink built from APP_ENV / APP_LOG_LEVEL, installed once)
//!
//! Per request:
//!     request_logger middleware → span carrying request_id
//!     access_log middleware     → one "HTTP request" event + metrics.rs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every request-scoped event
//! - Prometheus export is optional; recording without a recorder is a no-op

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, LogSettings};
