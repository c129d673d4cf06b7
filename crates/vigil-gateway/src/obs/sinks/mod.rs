//! Log sinks.
//!
//! Every destination implements [`Sink`]. The fan-out logger only sees
//! `Arc<dyn Sink>` and never branches on the concrete kind.

pub mod console;
pub mod file;
pub mod loki;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use vigil_core::{Level, LogRecord};

pub use console::ConsoleSink;
pub use file::FileSink;
pub use loki::LokiSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote rejected push: status {status}")]
    Status { status: u16 },
    #[error("sink closed")]
    Closed,
}

/// A destination for log records.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used when reporting this sink's failures.
    fn name(&self) -> &str;

    /// Records below this level are never handed to the sink.
    fn min_level(&self) -> Level {
        Level::Debug
    }

    async fn accept(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Period at which the fan-out worker calls [`Sink::flush`] on its own.
    fn flush_interval(&self) -> Option<Duration> {
        None
    }

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
