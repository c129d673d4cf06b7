//! Operational HTTP endpoints.
//!
//! - `/health`       : status, uptime, version, profile, configured services
//! - `/health/ready` : readiness
//! - `/health/live`  : liveness
//! - `/metrics`      : Prometheus text format

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use vigil_core::record::fields;

use crate::app_state::AppState;
use crate::config::Profile;
use crate::obs::metrics::CONTENT_TYPE;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let cfg = state.cfg();

    let mut services = Map::new();
    if cfg.environment == Profile::Production
        && state.logger().sink_names().iter().any(|n| n == "loki")
    {
        services.insert("loki".into(), Value::from("configured"));
    }

    let health = json!({
        "status": "healthy",
        "timestamp": now(),
        "uptime": state.uptime().as_secs_f64(),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": cfg.environment.as_str(),
        "services": services,
    });

    state.logger().info(
        "Health check performed",
        fields(json!({ "healthStatus": health })),
    );

    Json(health)
}

pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready", "timestamp": now() }))
}

pub async fn live() -> Json<Value> {
    Json(json!({ "status": "live", "timestamp": now() }))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        state.metrics().export(),
    )
        .into_response()
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Route not found" })),
    )
        .into_response()
}
