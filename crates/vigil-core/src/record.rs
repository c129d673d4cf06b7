//! Structured log records.
//!
//! A `LogRecord` is built once per log call and shared (behind an `Arc`) by
//! every sink. Nothing mutates it after construction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured fields attached to a record.
pub type Fields = Map<String, Value>;

/// Key under which a caller may pass a stack trace in the fields of an error
/// record.
pub const STACK_FIELD: &str = "stack";

/// Severity of a record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// One structured log event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    level: Level,
    message: String,
    fields: Fields,
    timestamp: DateTime<Utc>,
    stack: Option<String>,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    ///
    /// For error records a string `stack` field is lifted out of `fields` and
    /// kept as the record's stack trace.
    pub fn new(level: Level, message: impl Into<String>, mut fields: Fields) -> Self {
        let stack = if level == Level::Error {
            match fields.remove(STACK_FIELD) {
                Some(Value::String(s)) => Some(s),
                Some(other) => {
                    fields.insert(STACK_FIELD.to_string(), other);
                    None
                }
                None => None,
            }
        } else {
            None
        };

        Self {
            level,
            message: message.into(),
            fields,
            timestamp: Utc::now(),
            stack,
        }
    }

    /// Attach a stack trace. Ignored unless the record is an error.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        if self.level == Level::Error {
            self.stack = Some(stack.into());
        }
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}

/// Turn a `json!` value into record fields.
///
/// Objects are used as-is, `null` yields no fields, and any other value is
/// kept under a `value` key.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        Value::Null => Fields::new(),
        other => {
            let mut map = Fields::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
