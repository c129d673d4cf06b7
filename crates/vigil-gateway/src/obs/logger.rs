//! Sink fan-out logger.
//!
//! `log()` builds one immutable `LogRecord` and hands an `Arc` of it to every
//! sink's queue. It never blocks and never fails.
//!
//! Each sink owns an unbounded queue drained by its own worker task:
//! - a slow or hung sink only grows its own backlog
//! - an `Err` or a panic from `accept`/`flush` is caught in the worker and
//!   reported on the fallback sink (stderr console in production wiring)
//! - sinks with a `flush_interval` are flushed on a timer
//!
//! `shutdown()` drains every queue, flushes every sink and waits for the
//! workers. Records logged after shutdown are dropped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use vigil_core::record::fields;
use vigil_core::{Fields, Level, LogRecord};

use crate::config::{GatewayConfig, SinkSpec};
use crate::obs::sinks::{ConsoleSink, FileSink, LokiSink, Sink, SinkError};

struct Lane {
    min_level: Level,
    tx: mpsc::UnboundedSender<Arc<LogRecord>>,
}

pub struct FanoutLogger {
    min_level: Level,
    lanes: Vec<Lane>,
    sink_names: Vec<String>,
    shutdown_tx: watch::Sender<bool>,
    closed: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FanoutLogger {
    /// Spawn one worker per sink. Must run inside a tokio runtime.
    pub fn start(sinks: Vec<Arc<dyn Sink>>, fallback: Arc<dyn Sink>, min_level: Level) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut lanes = Vec::with_capacity(sinks.len());
        let mut sink_names = Vec::with_capacity(sinks.len());
        let mut workers = Vec::with_capacity(sinks.len());

        for sink in sinks {
            let (tx, rx) = mpsc::unbounded_channel();
            lanes.push(Lane {
                min_level: sink.min_level(),
                tx,
            });
            sink_names.push(sink.name().to_string());
            workers.push(tokio::spawn(run_lane(
                sink,
                Arc::clone(&fallback),
                rx,
                shutdown_rx.clone(),
            )));
        }

        Self {
            min_level,
            lanes,
            sink_names,
            shutdown_tx,
            closed: AtomicBool::new(false),
            workers: Mutex::new(workers),
        }
    }

    /// Build the sink set the config's profile calls for.
    pub async fn from_config(cfg: &GatewayConfig) -> Result<Self, SinkError> {
        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
        for spec in cfg.sink_plan() {
            let sink: Arc<dyn Sink> = match spec {
                SinkSpec::Console => Arc::new(ConsoleSink::stdout()),
                SinkSpec::File { path, min_level } => {
                    Arc::new(FileSink::open(path, min_level).await?)
                }
                SinkSpec::Loki(target) => Arc::new(LokiSink::new(target)?),
            };
            sinks.push(sink);
        }

        Ok(Self::start(
            sinks,
            Arc::new(ConsoleSink::stderr()),
            cfg.environment.min_level(),
        ))
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn sink_names(&self) -> &[String] {
        &self.sink_names
    }

    pub fn log(&self, level: Level, message: impl Into<String>, fields: Fields) {
        if level < self.min_level {
            return;
        }
        self.dispatch(LogRecord::new(level, message, fields));
    }

    /// Dispatch a prebuilt record (subject to the same level filter).
    pub fn log_record(&self, record: LogRecord) {
        if record.level() < self.min_level {
            return;
        }
        self.dispatch(record);
    }

    pub fn debug(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Info, message, fields);
    }

    pub fn warn(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Warn, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Error, message, fields);
    }

    fn dispatch(&self, record: LogRecord) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let record = Arc::new(record);
        for lane in &self.lanes {
            if record.level() >= lane.min_level {
                // A closed lane means its worker is gone; the record is dropped.
                let _ = lane.tx.send(Arc::clone(&record));
            }
        }
    }

    /// Drain queues, flush sinks, and wait for every worker to exit.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            let _ = worker.await;
        }
    }
}

async fn run_lane(
    sink: Arc<dyn Sink>,
    fallback: Arc<dyn Sink>,
    mut rx: mpsc::UnboundedReceiver<Arc<LogRecord>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = sink.flush_interval().map(|period| {
        let mut t = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    });

    loop {
        tokio::select! {
            biased;

            maybe = rx.recv() => {
                let Some(record) = maybe else { break; };
                deliver(&*sink, &*fallback, &record).await;
            }

            _ = tick(&mut ticker) => {
                flush(&*sink, &*fallback).await;
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    while let Ok(record) = rx.try_recv() {
                        deliver(&*sink, &*fallback, &record).await;
                    }
                    break;
                }
            }
        }
    }

    flush(&*sink, &*fallback).await;
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn deliver(sink: &dyn Sink, fallback: &dyn Sink, record: &LogRecord) {
    let outcome = AssertUnwindSafe(sink.accept(record)).catch_unwind().await;
    if let Some(reason) = failure(outcome) {
        report(fallback, sink.name(), "accept", reason).await;
    }
}

async fn flush(sink: &dyn Sink, fallback: &dyn Sink) {
    let outcome = AssertUnwindSafe(sink.flush()).catch_unwind().await;
    if let Some(reason) = failure(outcome) {
        report(fallback, sink.name(), "flush", reason).await;
    }
}

fn failure(
    outcome: Result<Result<(), SinkError>, Box<dyn Any + Send>>,
) -> Option<String> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Last-resort report; a failing fallback is ignored.
async fn report(fallback: &dyn Sink, sink: &str, op: &str, reason: String) {
    let record = LogRecord::new(
        Level::Error,
        "log sink failed",
        fields(json!({ "sink": sink, "op": op, "error": reason })),
    );
    let _ = AssertUnwindSafe(fallback.accept(&record)).catch_unwind().await;
}

/// How long the binary waits for `shutdown()` before exiting anyway.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
