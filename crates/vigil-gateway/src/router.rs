//! Axum router wiring.
//!
//! Ops endpoints plus the business routes handed in by the caller, wrapped
//! in the observability pipeline. Route layers run after routing resolved a
//! pattern; the outer layers see every request, unmatched ones included.

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::app_state::AppState;
use crate::middleware::{access_log, errors, instrument};
use crate::ops;

pub fn build_router(state: AppState, api: Router<AppState>) -> Router {
    let mut routes = Router::new()
        .route("/health", get(ops::health))
        .route("/health/ready", get(ops::ready))
        .route("/health/live", get(ops::live));

    if state.cfg().metrics.enabled {
        routes = routes.route("/metrics", get(ops::metrics));
    }

    let body_limit = state.cfg().server.body_limit_bytes;

    routes
        .merge(api)
        .route_layer(CatchPanicLayer::custom(errors::panic_response))
        .route_layer(from_fn(instrument::tag_matched_path))
        .fallback(ops::not_found)
        .layer(from_fn_with_state(state.clone(), errors::normalize))
        .layer(from_fn_with_state(state.clone(), access_log::access_log))
        .layer(from_fn_with_state(state.clone(), instrument::track))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
