//! Middleware chain behavior, exercised in-process.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::{Extension, Router};
use etl_pipeline::http::{middleware, RequestContext, UuidRequestId, X_REQUEST_ID};
use etl_pipeline::routing::build_router;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

mod common;

use common::{body_string, get as get_path, send, LogCapture};

fn request_id(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(X_REQUEST_ID)
        .expect("x-request-id header")
        .to_str()
        .unwrap()
        .to_owned()
}

async fn whoami(Extension(context): Extension<RequestContext>) -> String {
    tokio::time::sleep(Duration::from_millis(5)).await;
    tracing::info!(seen = context.request_id(), "handler ran");
    context.request_id().to_owned()
}

#[tokio::test]
async fn healthz_returns_exact_body() {
    let response = get_path(build_router(), "/healthz").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!request_id(&response).is_empty());
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn root_returns_greeting() {
    let response = get_path(build_router(), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Hello, Go-ETL-Pipeline");
}

#[tokio::test]
async fn unknown_path_is_404_with_request_id() {
    let response = get_path(build_router(), "/unknown-path").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!request_id(&response).is_empty());
}

#[tokio::test]
async fn method_mismatch_keeps_request_id() {
    let request = Request::post("/healthz").body(Body::empty()).unwrap();
    let response = send(build_router(), request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(!request_id(&response).is_empty());
}

#[tokio::test]
async fn inbound_request_id_is_echoed() {
    let request = Request::get("/healthz")
        .header(X_REQUEST_ID, "client-supplied-id")
        .body(Body::empty())
        .unwrap();
    let response = send(build_router(), request).await;

    assert_eq!(request_id(&response), "client-supplied-id");
}

#[tokio::test]
async fn blank_inbound_request_id_is_replaced() {
    for blank in ["", "   "] {
        let request = Request::get("/healthz")
            .header(X_REQUEST_ID, blank)
            .body(Body::empty())
            .unwrap();
        let response = send(build_router(), request).await;

        let id = request_id(&response);
        assert!(Uuid::parse_str(&id).is_ok(), "got {id:?}");
    }
}

#[tokio::test]
async fn blank_inbound_request_id_reaches_the_logger_replaced() {
    let (logs, _guard) = LogCapture::install();
    let router = middleware::apply(Router::new().route("/whoami", get(whoami)));

    let request = Request::get("/whoami")
        .header(X_REQUEST_ID, "")
        .body(Body::empty())
        .unwrap();
    let response = send(router, request).await;
    let id = request_id(&response);
    assert!(!id.is_empty());
    assert_eq!(body_string(response).await, id);

    let events = logs.messages("handler ran");
    assert_eq!(events[0]["span"]["request_id"], id.as_str());
}

#[tokio::test]
async fn request_ids_are_unique() {
    let router = build_router();
    let a = request_id(&get_path(router.clone(), "/").await);
    let b = request_id(&get_path(router.clone(), "/").await);
    let c = request_id(&get_path(router, "/unknown-path").await);

    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[tokio::test]
async fn panic_becomes_500_and_serving_continues() {
    let (logs, _guard) = LogCapture::install();
    let router = build_router();

    let response = get_path(router.clone(), "/panic").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let id = request_id(&response);
    assert!(!id.is_empty());
    assert_eq!(
        body_string(response).await,
        r#"{"error":"Internal Server Error"}"#
    );

    let recovered = logs.messages("Recovered from panic");
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0]["level"], "ERROR");
    assert_eq!(recovered[0]["request_id"], id.as_str());
    assert_eq!(recovered[0]["error"], "Panic to test the recovery middleware");
    assert!(!recovered[0]["stack_trace"].as_str().unwrap().is_empty());

    let next = get_path(router, "/healthz").await;
    assert_eq!(next.status(), StatusCode::OK);
    assert_eq!(body_string(next).await, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn panicking_request_is_access_logged_once() {
    let (logs, _guard) = LogCapture::install();

    let response = get_path(build_router(), "/panic").await;
    let id = request_id(&response);
    body_string(response).await;

    let access = logs.messages("HTTP request");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["status"], 500);
    assert_eq!(access[0]["path"], "/panic");
    assert_eq!(access[0]["request_id"], id.as_str());
    assert_eq!(access[0]["bytes"], r#"{"error":"Internal Server Error"}"#.len());
}

#[tokio::test]
async fn access_log_has_every_field() {
    let (logs, _guard) = LogCapture::install();
    let remote: SocketAddr = "10.1.2.3:45678".parse().unwrap();

    let mut request = Request::get("/healthz").body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(remote));
    let response = send(build_router(), request).await;
    let id = request_id(&response);

    assert!(logs.messages("HTTP request").is_empty());
    let body = body_string(response).await;

    let access = logs.messages("HTTP request");
    assert_eq!(access.len(), 1);
    let entry = &access[0];
    assert_eq!(entry["level"], "INFO");
    assert_eq!(entry["request_id"], id.as_str());
    assert_eq!(entry["method"], "GET");
    assert_eq!(entry["path"], "/healthz");
    assert_eq!(entry["status"], 200);
    assert_eq!(entry["bytes"], body.len());
    assert_eq!(entry["remote"], "10.1.2.3:45678");
    assert!(entry["duration_ms"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn not_found_is_access_logged() {
    let (logs, _guard) = LogCapture::install();

    let response = get_path(build_router(), "/nope").await;
    body_string(response).await;

    let access = logs.messages("HTTP request");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["status"], 404);
    assert_eq!(access[0]["remote"], "unknown");
}

#[tokio::test]
async fn handler_sees_request_scoped_logger() {
    let (logs, _guard) = LogCapture::install();
    let router = middleware::apply(Router::new().route("/whoami", get(whoami)));

    let response = get_path(router, "/whoami").await;
    let id = request_id(&response);
    assert_eq!(body_string(response).await, id);

    let events = logs.messages("handler ran");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["seen"], id.as_str());
    assert_eq!(events[0]["span"]["request_id"], id.as_str());
}

#[tokio::test]
async fn concurrent_requests_do_not_share_context() {
    let (logs, _guard) = LogCapture::install();
    let router = middleware::apply(Router::new().route("/whoami", get(whoami)));

    let (a, b) = tokio::join!(
        get_path(router.clone(), "/whoami"),
        get_path(router.clone(), "/whoami"),
    );
    let (id_a, id_b) = (request_id(&a), request_id(&b));
    assert_ne!(id_a, id_b);
    assert_eq!(body_string(a).await, id_a);
    assert_eq!(body_string(b).await, id_b);

    let events = logs.messages("handler ran");
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(event["seen"], event["span"]["request_id"]);
    }

    let mut seen: Vec<_> = events
        .iter()
        .map(|e| e["seen"].as_str().unwrap().to_owned())
        .collect();
    seen.sort();
    let mut expected = vec![id_a, id_b];
    expected.sort();
    assert_eq!(seen, expected);
}

#[derive(Clone)]
struct FailingRequestId;

impl MakeRequestId for FailingRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        panic!("request id generator failed")
    }
}

#[tokio::test]
async fn panic_while_assigning_id_is_recovered_without_id() {
    let (logs, _guard) = LogCapture::install();
    let router = middleware::apply_with(
        Router::new().route("/", get(|| async { "unreachable" })),
        FailingRequestId,
        Duration::from_secs(10),
    );

    let response = get_path(router, "/").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(response).await,
        r#"{"error":"Internal Server Error"}"#
    );

    let recovered = logs.messages("Recovered from panic");
    assert_eq!(recovered.len(), 1);
    assert!(recovered[0]["request_id"].is_null());
    assert_eq!(recovered[0]["error"], "request id generator failed");
}

#[tokio::test]
async fn slow_request_times_out_with_request_id() {
    let (logs, _guard) = LogCapture::install();
    let router = middleware::apply_with(
        Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "late"
            }),
        ),
        UuidRequestId,
        Duration::from_millis(50),
    );

    let response = get_path(router, "/slow").await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let id = request_id(&response);
    assert!(!id.is_empty());
    body_string(response).await;

    let access = logs.messages("HTTP request");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["status"], 408);
    assert_eq!(access[0]["request_id"], id.as_str());
}
