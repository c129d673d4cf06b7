//! Access log: one info record per request in the combined log format.
//!
//! `127.0.0.1 - - [14/Nov/2023:22:13:20 +0000] "GET /users/42 HTTP/1.1" 200 17 "-" "curl/8.4.0"`

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, Version},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use http_body::Body as _;
use vigil_core::Fields;

use crate::app_state::AppState;

pub async fn access_log(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let entry = AccessEntry {
        remote_addr: req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
        method: req.method().to_string(),
        url: req.uri().to_string(),
        version: req.version(),
        referrer: header_value(req.headers(), &header::REFERER),
        user_agent: header_value(req.headers(), &header::USER_AGENT),
        at: Utc::now(),
    };

    let res = next.run(req).await;

    let length = header_value(res.headers(), &header::CONTENT_LENGTH)
        .or_else(|| res.body().size_hint().exact().map(|n| n.to_string()));
    state
        .logger()
        .info(entry.combined(res.status().as_u16(), length.as_deref()), Fields::new());

    res
}

struct AccessEntry {
    remote_addr: Option<String>,
    method: String,
    url: String,
    version: Version,
    referrer: Option<String>,
    user_agent: Option<String>,
    at: DateTime<Utc>,
}

impl AccessEntry {
    fn combined(&self, status: u16, length: Option<&str>) -> String {
        format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {} \"{}\" \"{}\"",
            self.remote_addr.as_deref().unwrap_or("-"),
            self.at.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.url,
            http_version(self.version),
            status,
            length.unwrap_or("-"),
            self.referrer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }
}

fn http_version(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
