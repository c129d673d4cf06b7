//! Remote log aggregation (Loki push API).
//!
//! Records are buffered and pushed as one stream per batch:
//!
//! ```json
//! {"streams":[{"stream":{"environment":"production","job":"vigil-gateway"},
//!              "values":[["<unix-nanos>","<json line>"], ...]}]}
//! ```
//!
//! A batch goes out when it reaches `batch_size`, when the fan-out worker's
//! flush timer fires, and on shutdown. A batch that fails to send is dropped
//! and the error surfaces to the fan-out logger, which reports it on the
//! fallback console. Nothing is retried.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use vigil_core::format::render_json_line;
use vigil_core::LogRecord;

use super::{Sink, SinkError};
use crate::config::LokiTarget;

#[derive(Serialize)]
struct PushRequest<'a> {
    streams: [Stream<'a>; 1],
}

#[derive(Serialize)]
struct Stream<'a> {
    stream: &'a BTreeMap<String, String>,
    values: &'a [[String; 2]],
}

pub struct LokiSink {
    push_url: String,
    labels: BTreeMap<String, String>,
    batch_size: usize,
    batch_interval: Duration,
    client: reqwest::Client,
    pending: Mutex<Vec<[String; 2]>>,
}

impl LokiSink {
    pub fn new(target: LokiTarget) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(target.timeout).build()?;

        Ok(Self {
            push_url: target.push_url,
            labels: target.labels,
            batch_size: target.batch_size.max(1),
            batch_interval: target.batch_interval,
            client,
            pending: Mutex::new(Vec::with_capacity(target.batch_size)),
        })
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    async fn push(&self, values: Vec<[String; 2]>) -> Result<(), SinkError> {
        if values.is_empty() {
            return Ok(());
        }

        let body = PushRequest {
            streams: [Stream {
                stream: &self.labels,
                values: &values,
            }],
        };

        let res = self.client.post(&self.push_url).json(&body).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for LokiSink {
    fn name(&self) -> &str {
        "loki"
    }

    async fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        let nanos = record
            .timestamp()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string();
        let line = render_json_line(record)?;

        let ready = {
            let mut pending = self.pending.lock().await;
            pending.push([nanos, line]);
            if pending.len() >= self.batch_size {
                Some(std::mem::take(&mut *pending))
            } else {
                None
            }
        };

        match ready {
            Some(batch) => self.push(batch).await,
            None => Ok(()),
        }
    }

    fn flush_interval(&self) -> Option<Duration> {
        Some(self.batch_interval)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let batch = std::mem::take(&mut *self.pending.lock().await);
        self.push(batch).await
    }
}
