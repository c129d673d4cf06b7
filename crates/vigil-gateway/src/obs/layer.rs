//! `tracing` bridge: forwards events to the fan-out logger so the gateway's
//! own diagnostics reach the same sinks, in the same formats, as request logs.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use vigil_core::{Fields, Level, LogRecord};

use crate::obs::logger::FanoutLogger;

/// Targets whose events are never forwarded. The remote sink's HTTP client
/// runs inside a sink worker; forwarding its events would loop.
const IGNORED_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

pub struct SinkLayer {
    logger: Arc<FanoutLogger>,
}

impl SinkLayer {
    pub fn new(logger: Arc<FanoutLogger>) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let target = meta.target();
        if IGNORED_TARGETS
            .iter()
            .any(|t| target == *t || target.starts_with(&format!("{t}::")))
        {
            return;
        }

        let level = Level::from(meta.level());
        if level < self.logger.min_level() {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        visitor
            .fields
            .insert("target".to_string(), Value::String(target.to_string()));

        self.logger.log_record(LogRecord::new(
            level,
            visitor.message.unwrap_or_default(),
            visitor.fields,
        ));
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Fields,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }
}
