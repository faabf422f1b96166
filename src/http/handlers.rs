//! Endpoint handlers.

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// `GET /`
pub async fn root() -> &'static str {
    "Hello, Go-ETL-Pipeline"
}

/// `GET /healthz`
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /panic`. Exists only to exercise the recovery boundary.
pub async fn trigger_panic() -> StatusCode {
    panic!("Panic to test the recovery middleware")
}

/// Fallback for unregistered paths.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
