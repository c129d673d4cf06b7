#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use axum::{
    body::Body,
    extract::Path,
    http::{header, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use vigil_core::{ApiError, Level};
use vigil_gateway::app_state::AppState;
use vigil_gateway::config::Profile;
use vigil_gateway::middleware::HandlerResult;
use vigil_gateway::obs::metrics::CONTENT_TYPE;
use vigil_gateway::router::build_router;

use common::Harness;

fn read_disk() -> std::io::Result<String> {
    Err(std::io::Error::other("disk on fire"))
}

async fn user(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "id": id }))
}

async fn boom() -> HandlerResult<Json<Value>> {
    let contents = read_disk()?;
    Ok(Json(json!({ "contents": contents })))
}

async fn bad() -> HandlerResult<Json<Value>> {
    Err(ApiError::bad_request("bad input").into())
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn panicky() -> &'static str {
    panic!("kaboom")
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(user))
        .route("/boom", get(boom))
        .route("/bad", get(bad))
        .route("/panic", get(panicky))
        .route("/echo", post(echo))
}

async fn call(h: &Harness, uri: &str) -> (Response, Vec<u8>) {
    send(h, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(h: &Harness, uri: &str, body: &str) -> (Response, Vec<u8>) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(h, req).await
}

async fn send(h: &Harness, req: Request<Body>) -> (Response, Vec<u8>) {
    let app = build_router(h.state.clone(), api());
    let res = app.oneshot(req).await.unwrap();
    let (parts, body) = res.into_parts();
    // Draining the body is what completes the request.
    let bytes = body.collect().await.unwrap().to_bytes().to_vec();
    (Response::from_parts(parts, Body::empty()), bytes)
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn matched_route_is_labeled_by_pattern() {
    let h = Harness::new(Profile::Test);

    let (res, body) = call(&h, "/users/42").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_of(&body)["id"], "42");

    let metrics = h.state.metrics();
    assert_eq!(metrics.request_count("/users/:id", "GET", 200), 1);
    assert_eq!(metrics.request_count("/users/42", "GET", 200), 0);
    assert_eq!(metrics.latency("/users/:id", "GET", 200).unwrap().count, 1);
}

#[tokio::test]
async fn unmatched_route_is_labeled_by_raw_path() {
    let h = Harness::new(Profile::Test);

    let (res, body) = call(&h, "/bogus").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body), json!({ "message": "Route not found" }));
    assert_eq!(h.state.metrics().request_count("/bogus", "GET", 404), 1);
}

#[tokio::test]
async fn plain_failure_becomes_generic_500_and_is_logged_with_stack() {
    let h = Harness::new(Profile::Development);

    let (res, body) = call(&h, "/boom").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_of(&body);
    assert_eq!(body["code"], 500);
    assert_eq!(body["message"], "Internal Server Error");
    assert!(body["stack"].as_str().unwrap().contains("disk on fire"));

    assert_eq!(h.state.metrics().request_count("/boom", "GET", 500), 1);

    let records = h.drain().await;
    let errors: Vec<_> = records
        .iter()
        .filter(|r| r.level() == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1);

    let err = errors[0];
    assert_eq!(err.message(), "Internal Server Error");
    assert!(err.stack().unwrap().contains("disk on fire"));
    assert_eq!(err.field("url"), Some(&json!("/boom")));
    assert_eq!(err.field("method"), Some(&json!("GET")));
    assert_eq!(err.field("statusCode"), Some(&json!(500)));
    assert_eq!(err.field("isOperational"), Some(&json!(false)));
}

#[tokio::test]
async fn api_error_passes_through_unchanged() {
    let h = Harness::new(Profile::Test);

    let (res, body) = call(&h, "/bad").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body), json!({ "code": 400, "message": "bad input" }));
    assert_eq!(h.state.metrics().request_count("/bad", "GET", 400), 1);

    let records = h.drain().await;
    let err = records
        .iter()
        .find(|r| r.level() == Level::Error)
        .expect("error record");
    assert_eq!(err.message(), "bad input");
    assert_eq!(err.field("isOperational"), Some(&json!(true)));
}

#[tokio::test]
async fn production_hides_stack_from_clients() {
    let h = Harness::new(Profile::Production);

    let (res, body) = call(&h, "/boom").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_of(&body),
        json!({ "code": 500, "message": "Internal Server Error" })
    );

    // Still logged in full.
    let records = h.drain().await;
    let err = records
        .iter()
        .find(|r| r.level() == Level::Error)
        .expect("error record");
    assert!(err.stack().unwrap().contains("disk on fire"));
}

#[tokio::test]
async fn handler_panic_is_normalized() {
    let h = Harness::new(Profile::Development);

    let (res, body) = call(&h, "/panic").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_of(&body);
    assert_eq!(body["message"], "Internal Server Error");
    assert!(body["stack"].as_str().unwrap().contains("kaboom"));

    assert_eq!(h.state.metrics().request_count("/panic", "GET", 500), 1);
}

#[tokio::test]
async fn metrics_endpoint_exports_prometheus_text() {
    let h = Harness::new(Profile::Test);
    call(&h, "/users/7").await;

    let (res, body) = call(&h, "/metrics").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        CONTENT_TYPE
    );

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("# TYPE http_request_duration_ms histogram"));
    assert!(text.contains("# TYPE http_requests_total counter"));
    assert!(text.contains(r#"http_requests_total{route="/users/:id",method="GET",status="200"} 1"#));
    assert!(text.contains(
        r#"http_request_duration_ms_bucket{route="/users/:id",method="GET",status="200",le="+Inf"} 1"#
    ));
}

#[tokio::test]
async fn metrics_endpoint_can_be_disabled() {
    let mut cfg = vigil_gateway::config::GatewayConfig::default();
    cfg.environment = Profile::Test;
    cfg.metrics.enabled = false;
    let h = Harness::with_config(cfg);

    let (res, _) = call(&h, "/metrics").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn every_request_gets_an_access_line() {
    let h = Harness::new(Profile::Test);
    call(&h, "/users/9").await;

    let records = h.drain().await;
    let line = records
        .iter()
        .find(|r| r.message().contains("\"GET /users/9 HTTP/1.1\""))
        .expect("access line");
    assert_eq!(line.level(), Level::Info);
    assert!(line.message().starts_with("- - - ["));
    assert!(line.message().contains("\" 200 "));
}

#[tokio::test]
async fn malformed_json_is_normalized() {
    let h = Harness::new(Profile::Development);

    let (res, body) = post_json(&h, "/echo", "{not json").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body = json_of(&body);
    assert_eq!(body["code"], 400);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to parse the request body as JSON"));
    assert_eq!(h.state.metrics().request_count("/echo", "POST", 400), 1);

    let records = h.drain().await;
    let errors: Vec<_> = records
        .iter()
        .filter(|r| r.level() == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("statusCode"), Some(&json!(400)));
    assert_eq!(errors[0].field("isOperational"), Some(&json!(true)));
    assert_eq!(errors[0].field("url"), Some(&json!("/echo")));
}

#[tokio::test]
async fn oversized_body_is_normalized() {
    let mut cfg = vigil_gateway::config::GatewayConfig::default();
    cfg.environment = Profile::Test;
    cfg.server.body_limit_bytes = 16;
    let h = Harness::with_config(cfg);

    let payload = json!({ "padding": "x".repeat(256) }).to_string();
    let (res, body) = post_json(&h, "/echo", &payload).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = json_of(&body);
    assert_eq!(body["code"], 413);
    assert!(!body["message"].as_str().unwrap().is_empty());

    let records = h.drain().await;
    let errors: Vec<_> = records
        .iter()
        .filter(|r| r.level() == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("statusCode"), Some(&json!(413)));
}

#[tokio::test]
async fn valid_json_is_untouched() {
    let h = Harness::new(Profile::Test);

    let (res, body) = post_json(&h, "/echo", r#"{"a":1}"#).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_of(&body), json!({ "a": 1 }));

    let records = h.drain().await;
    assert!(records.iter().all(|r| r.level() != Level::Error));
}
