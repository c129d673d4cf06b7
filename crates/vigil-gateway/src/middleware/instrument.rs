//! Request instrumentor.
//!
//! Per request: `Started` (probe created before routing) → `Completed` (the
//! response body reached end of stream). Completion records one sample in the
//! metric registry; any later completion signal is ignored. A body dropped
//! before its end (client went away) records nothing.
//!
//! The route label comes from the matched pattern. `tag_matched_path` runs as
//! a route layer, where axum has already resolved `MatchedPath`, and copies it
//! onto the response so the outer `track` layer can read it. Requests no route
//! matched keep their raw path.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body::{Frame, SizeHint};

use crate::app_state::AppState;
use crate::obs::{MetricRegistry, MetricSample};

/// Route layer: stamp the matched pattern on the response.
pub async fn tag_matched_path(req: Request, next: Next) -> Response {
    let matched = req.extensions().get::<MatchedPath>().cloned();
    let mut res = next.run(req).await;
    if let Some(matched) = matched {
        res.extensions_mut().insert(matched);
    }
    res
}

/// Outer layer: time the request and record it when its body completes.
pub async fn track(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let probe = RequestProbe::start(state.metrics(), req.method().as_str(), req.uri().path());

    let res = next.run(req).await;

    let route = res
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned());
    let completion = Arc::new(probe.respond(route, res.status().as_u16()));

    let (parts, body) = res.into_parts();
    Response::from_parts(parts, Body::new(InstrumentedBody::new(body, completion)))
}

/// A request in the `Started` state.
pub struct RequestProbe {
    registry: Arc<MetricRegistry>,
    method: String,
    path: String,
    started: Instant,
}

impl RequestProbe {
    pub fn start(registry: Arc<MetricRegistry>, method: &str, path: &str) -> Self {
        Self {
            registry,
            method: method.to_string(),
            path: path.to_string(),
            started: Instant::now(),
        }
    }

    /// Response head is known; resolve the route label and wait for completion.
    pub fn respond(self, matched_route: Option<String>, status: u16) -> Completion {
        Completion {
            registry: self.registry,
            route: matched_route.unwrap_or(self.path),
            method: self.method,
            status,
            started: self.started,
            fired: AtomicBool::new(false),
        }
    }
}

/// Pending `Completed` transition of one request.
pub struct Completion {
    registry: Arc<MetricRegistry>,
    route: String,
    method: String,
    status: u16,
    started: Instant,
    fired: AtomicBool,
}

impl Completion {
    /// Record the sample. Returns `false` if this request was already recorded.
    pub fn complete(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.registry.record(&MetricSample {
            route: self.route.clone(),
            method: self.method.clone(),
            status: self.status,
            duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        });
        true
    }

    pub fn is_completed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

/// Response body that fires its request's completion at end of stream.
pub struct InstrumentedBody {
    inner: Body,
    completion: Arc<Completion>,
}

impl InstrumentedBody {
    pub fn new(inner: Body, completion: Arc<Completion>) -> Self {
        Self { inner, completion }
    }
}

impl http_body::Body for InstrumentedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(None) => {
                this.completion.complete();
            }
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => {
                this.completion.complete();
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        let end = self.inner.is_end_stream();
        if end {
            // Empty bodies may never be polled.
            self.completion.complete();
        }
        end
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
