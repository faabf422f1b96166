//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use etl_pipeline::config::{ServerConfig, ConfigDuration};
use etl_pipeline::http::{HttpServer, ServerErrors};
use etl_pipeline::observability::LogSettings;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tracing::dispatcher::DefaultGuard;

/// In-memory log sink. Install with [`LogCapture::install`].
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Route JSON logs on the current thread into a fresh buffer.
    ///
    /// Only events emitted on this thread are captured, so tests using it must
    /// run on the current-thread runtime (the `#[tokio::test]` default).
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let settings = LogSettings::from_values(Some("test".into()), Some("debug".into()));
        let guard = tracing::dispatcher::set_default(&settings.dispatch(move || writer.clone()));
        (capture, guard)
    }

    /// Every captured line, parsed as JSON.
    pub fn entries(&self) -> Vec<Value> {
        let raw = self.0.lock().unwrap().clone();
        String::from_utf8(raw)
            .unwrap()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Captured entries whose message is `message`.
    pub fn messages(&self, message: &str) -> Vec<Value> {
        self.entries()
            .into_iter()
            .filter(|entry| entry["message"] == message)
            .collect()
    }
}

/// Server settings for tests: loopback, any port.
pub fn server_config(shutdown_timeout: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        shutdown_timeout: ConfigDuration(shutdown_timeout),
        ..ServerConfig::default()
    }
}

/// Start `router` on an ephemeral loopback port.
pub async fn spawn_server(
    router: Router,
    shutdown_timeout: Duration,
) -> (HttpServer, ServerErrors, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut server = HttpServer::with_router(&server_config(shutdown_timeout), router);
    let errors = server.start_on(listener).unwrap();
    (server, errors, addr)
}

/// HTTP client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Send a `GET` through `router` in-process.
pub async fn get(router: Router, uri: &str) -> Response<Body> {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

/// Collect a response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
