//! Error normalizer.
//!
//! Every request-path failure ends up here exactly once:
//! - a handler returns `Err(HandlerError)`
//! - a handler panics (`CatchPanicLayer`, installed as a route layer, hands
//!   the payload to `panic_response`)
//! - an extractor rejects the request (malformed JSON, body over the limit)
//!
//! The first two produce a bare response carrying a `NormalizedError`
//! extension. Rejections are plain-text responses from a matched route with
//! no such extension; their status is kept and their text becomes the
//! message. The `normalize` layer logs one error record per failure and
//! renders the client body `{code, message}` (+ `stack` when the profile
//! exposes it).

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use vigil_core::record::fields;
use vigil_core::{ApiError, Level, LogRecord, NormalizedError};

use crate::app_state::AppState;
use crate::obs::logger::panic_message;
use crate::obs::FanoutLogger;

/// Result type for business handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Any error a handler can raise with `?`.
///
/// Deliberately not an `Error` itself, so the blanket `From` stays coherent.
pub struct HandlerError {
    inner: Box<dyn StdError + Send + Sync>,
    backtrace: Backtrace,
}

impl HandlerError {
    pub fn new(inner: Box<dyn StdError + Send + Sync>) -> Self {
        Self {
            inner,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }

    /// `ApiError` passes through untouched; anything else becomes a 500 whose
    /// stack is the error chain, followed by the backtrace if one was captured.
    pub fn normalized(&self) -> NormalizedError {
        let mut normalized = NormalizedError::from_error(&*self.inner);
        if self.inner.downcast_ref::<ApiError>().is_none()
            && self.backtrace.status() == BacktraceStatus::Captured
        {
            let trace = self.backtrace.to_string();
            normalized.stack = Some(match normalized.stack.take() {
                Some(chain) => format!("{chain}\n{trace}"),
                None => trace,
            });
        }
        normalized
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(Box::new(err))
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        marked(self.normalized())
    }
}

/// `CatchPanicLayer` callback: a handler panic is a programmer error.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let stack = format!("panic: {}", panic_message(payload.as_ref()));
    marked(NormalizedError::internal(Some(stack)))
}

/// Bare response whose status matches the error; the body is rendered later
/// by `normalize`.
fn marked(err: NormalizedError) -> Response {
    let mut res = status_of(&err).into_response();
    res.extensions_mut().insert(err);
    res
}

fn status_of(err: &NormalizedError) -> StatusCode {
    StatusCode::from_u16(err.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Request details attached to the error log record.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub url: String,
    pub method: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_request(req: &Request) -> Self {
        Self {
            url: req.uri().to_string(),
            method: req.method().to_string(),
            ip: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string()),
            user_agent: req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        }
    }
}

/// Client-facing error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

pub struct ErrorNormalizer {
    logger: Arc<FanoutLogger>,
    expose_stack: bool,
}

impl ErrorNormalizer {
    pub fn new(logger: Arc<FanoutLogger>, expose_stack: bool) -> Self {
        Self {
            logger,
            expose_stack,
        }
    }

    pub fn exposes_stack(&self) -> bool {
        self.expose_stack
    }

    /// One structured error record per failure.
    pub fn report(&self, err: &NormalizedError, meta: &RequestMeta) {
        let mut record = LogRecord::new(
            Level::Error,
            err.message.clone(),
            fields(json!({
                "url": meta.url,
                "method": meta.method,
                "ip": meta.ip,
                "userAgent": meta.user_agent,
                "statusCode": err.status_code,
                "isOperational": err.is_operational,
            })),
        );
        if let Some(stack) = &err.stack {
            record = record.with_stack(stack.clone());
        }
        self.logger.log_record(record);
    }

    pub fn body(&self, err: &NormalizedError) -> ErrorBody {
        ErrorBody {
            code: err.status_code,
            message: err.message.clone(),
            stack: if self.expose_stack {
                err.stack.clone()
            } else {
                None
            },
        }
    }

    /// Log, then render.
    pub fn respond(&self, err: &NormalizedError, meta: &RequestMeta) -> Response {
        self.report(err, meta);
        (status_of(err), Json(self.body(err))).into_response()
    }
}

/// Rejection bodies are short; anything longer is not read.
const REJECTION_BODY_LIMIT: usize = 16 * 1024;

/// Layer that turns failure responses into logged, rendered errors.
pub async fn normalize(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let meta = RequestMeta::from_request(&req);
    let res = next.run(req).await;

    let marked = res.extensions().get::<NormalizedError>().cloned();
    if marked.is_none() && !is_rejection(&res) {
        return res;
    }

    let (parts, body) = res.into_parts();
    let err = match marked {
        Some(err) => err,
        None => rejection_error(parts.status, body).await,
    };

    // Extensions carry the matched route (and the error) to the outer layers.
    let mut rendered = state.normalizer().respond(&err, &meta);
    rendered.extensions_mut().extend(parts.extensions);
    rendered.extensions_mut().insert(err);
    rendered
}

/// An error status from a matched route that no handler error produced.
/// The 404 fallback never matched a route and keeps its own body.
fn is_rejection(res: &Response) -> bool {
    (res.status().is_client_error() || res.status().is_server_error())
        && res.extensions().get::<MatchedPath>().is_some()
}

async fn rejection_error(status: StatusCode, body: Body) -> NormalizedError {
    let text = to_bytes(body, REJECTION_BODY_LIMIT)
        .await
        .ok()
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    if status.is_server_error() {
        return NormalizedError::internal(text);
    }

    let message = text.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });
    ApiError::new(status.as_u16(), message).into()
}
