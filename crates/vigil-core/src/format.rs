//! Log record rendering.
//!
//! Two encodings exist:
//! - console: one line, `<timestamp> <level>: <message> <extra-json>`, with
//!   the level colorized when the target is a terminal
//! - structured: a JSON object with `timestamp`, `level`, `message`, every
//!   field, and `stack` for error records (file and remote sinks)

use chrono::SecondsFormat;
use serde_json::Value;

use crate::record::{Level, LogRecord, STACK_FIELD};

const RESET: &str = "\x1b[39m";

fn color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug => "\x1b[34m",
    }
}

/// RFC 3339 timestamp with millisecond precision and a `Z` suffix.
pub fn timestamp(record: &LogRecord) -> String {
    record
        .timestamp()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Single-line console rendering.
///
/// Fields (and the stack of an error record) are appended as compact JSON so
/// the line never breaks.
pub fn render_console(record: &LogRecord, colored: bool) -> String {
    let level = if colored {
        format!("{}{}{}", color(record.level()), record.level(), RESET)
    } else {
        record.level().to_string()
    };

    let mut line = format!("{} {}: {}", timestamp(record), level, record.message());

    let mut extra = record.fields().clone();
    if let Some(stack) = record.stack() {
        extra.insert(STACK_FIELD.to_string(), Value::String(stack.to_string()));
    }
    if !extra.is_empty() {
        line.push(' ');
        line.push_str(&Value::Object(extra).to_string());
    }
    line
}

/// Structured rendering as a JSON tree.
///
/// Fixed keys win over fields of the same name.
pub fn render_json(record: &LogRecord) -> Value {
    let mut obj = record.fields().clone();
    obj.insert("timestamp".to_string(), Value::String(timestamp(record)));
    obj.insert(
        "level".to_string(),
        Value::String(record.level().as_str().to_string()),
    );
    obj.insert(
        "message".to_string(),
        Value::String(record.message().to_string()),
    );
    if let Some(stack) = record.stack() {
        obj.insert(STACK_FIELD.to_string(), Value::String(stack.to_string()));
    }
    Value::Object(obj)
}

/// Structured rendering as one line of JSON (no trailing newline).
pub fn render_json_line(record: &LogRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(&render_json(record))
}
