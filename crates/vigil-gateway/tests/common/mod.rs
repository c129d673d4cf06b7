#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vigil_core::{Level, LogRecord};
use vigil_gateway::app_state::AppState;
use vigil_gateway::config::{GatewayConfig, Profile};
use vigil_gateway::obs::{FanoutLogger, Sink, SinkError};

/// Keeps every accepted record in memory.
pub struct RecordingSink {
    name: &'static str,
    min_level: Level,
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingSink {
    pub fn new(name: &'static str) -> Arc<Self> {
        Self::with_level(name, Level::Debug)
    }

    pub fn with_level(name: &'static str, min_level: Level) -> Arc<Self> {
        Arc::new(Self {
            name,
            min_level,
            records: Mutex::new(Vec::new()),
        })
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|r| r.message().to_string())
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        self.name
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    async fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Rejects every record.
pub struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn accept(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Err(SinkError::Closed)
    }
}

/// Panics on every record.
pub struct PanickingSink;

#[async_trait]
impl Sink for PanickingSink {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn accept(&self, _record: &LogRecord) -> Result<(), SinkError> {
        panic!("sink exploded")
    }
}

/// Never finishes accepting its first record.
pub struct HungSink;

#[async_trait]
impl Sink for HungSink {
    fn name(&self) -> &str {
        "hung"
    }

    async fn accept(&self, _record: &LogRecord) -> Result<(), SinkError> {
        std::future::pending().await
    }
}

/// Gateway state for `profile`, logging into one recording sink.
pub struct Harness {
    pub state: AppState,
    pub logger: Arc<FanoutLogger>,
    pub sink: Arc<RecordingSink>,
    pub fallback: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(profile: Profile) -> Self {
        let cfg = GatewayConfig {
            environment: profile,
            ..GatewayConfig::default()
        };
        Self::with_config(cfg)
    }

    pub fn with_config(cfg: GatewayConfig) -> Self {
        let sink = RecordingSink::new("recording");
        let fallback = RecordingSink::new("fallback");
        let logger = Arc::new(FanoutLogger::start(
            vec![sink.clone() as Arc<dyn Sink>],
            fallback.clone(),
            cfg.environment.min_level(),
        ));
        let state = AppState::new(cfg, Arc::clone(&logger));

        Self {
            state,
            logger,
            sink,
            fallback,
        }
    }

    /// Drain the logger so every record so far is visible in the sinks.
    pub async fn drain(&self) -> Vec<LogRecord> {
        self.logger.shutdown().await;
        self.sink.records()
    }
}
