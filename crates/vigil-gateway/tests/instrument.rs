#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use vigil_gateway::middleware::instrument::{InstrumentedBody, RequestProbe};
use vigil_gateway::obs::MetricRegistry;

#[test]
fn completion_fires_once() {
    let reg = Arc::new(MetricRegistry::default());
    let done = RequestProbe::start(Arc::clone(&reg), "GET", "/users/1")
        .respond(Some("/users/:id".into()), 200);

    assert!(!done.is_completed());
    assert!(done.complete());
    assert!(!done.complete());
    assert!(done.is_completed());

    assert_eq!(reg.request_count("/users/:id", "GET", 200), 1);
    assert_eq!(reg.latency("/users/:id", "GET", 200).unwrap().count, 1);
}

#[test]
fn unmatched_request_keeps_its_raw_path() {
    let reg = Arc::new(MetricRegistry::default());
    let done = RequestProbe::start(Arc::clone(&reg), "POST", "/nowhere").respond(None, 404);

    assert_eq!(done.route(), "/nowhere");
    done.complete();
    assert_eq!(reg.request_count("/nowhere", "POST", 404), 1);
}

#[tokio::test]
async fn body_end_of_stream_completes_the_request() {
    let reg = Arc::new(MetricRegistry::default());
    let done = Arc::new(
        RequestProbe::start(Arc::clone(&reg), "GET", "/a").respond(Some("/a".into()), 200),
    );

    let body = InstrumentedBody::new(Body::from("hello"), Arc::clone(&done));
    assert_eq!(reg.request_count("/a", "GET", 200), 0);

    let bytes = body.collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello");
    assert!(done.is_completed());
    assert_eq!(reg.request_count("/a", "GET", 200), 1);
}

#[tokio::test]
async fn empty_body_completes_too() {
    let reg = Arc::new(MetricRegistry::default());
    let done = Arc::new(
        RequestProbe::start(Arc::clone(&reg), "HEAD", "/h").respond(Some("/h".into()), 204),
    );

    InstrumentedBody::new(Body::empty(), Arc::clone(&done))
        .collect()
        .await
        .unwrap();
    assert_eq!(reg.request_count("/h", "HEAD", 204), 1);
}

#[test]
fn body_dropped_before_its_end_records_nothing() {
    let reg = Arc::new(MetricRegistry::default());
    let done = Arc::new(
        RequestProbe::start(Arc::clone(&reg), "GET", "/slow").respond(Some("/slow".into()), 200),
    );

    drop(InstrumentedBody::new(Body::from("never read"), Arc::clone(&done)));

    assert!(!done.is_completed());
    assert_eq!(reg.request_count("/slow", "GET", 200), 0);
}
