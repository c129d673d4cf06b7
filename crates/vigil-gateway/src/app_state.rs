//! Shared application state for the vigil gateway.
//!
//! The metric registry and the fan-out logger are built once at startup and
//! handed to every middleware and endpoint through this state; there are no
//! process globals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::GatewayConfig;
use crate::middleware::errors::ErrorNormalizer;
use crate::obs::{FanoutLogger, MetricRegistry};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<MetricRegistry>,
    logger: Arc<FanoutLogger>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    normalizer: ErrorNormalizer,
    started: Instant,
}

impl AppState {
    pub fn new(cfg: GatewayConfig, logger: Arc<FanoutLogger>) -> Self {
        let metrics = Arc::new(MetricRegistry::new(cfg.metrics.buckets_ms.clone()));
        let normalizer = ErrorNormalizer::new(Arc::clone(&logger), cfg.environment.exposes_stack());

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                normalizer,
                started: Instant::now(),
            }),
            metrics,
            logger,
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<MetricRegistry> {
        Arc::clone(&self.metrics)
    }

    pub fn logger(&self) -> &FanoutLogger {
        &self.logger
    }

    pub fn normalizer(&self) -> &ErrorNormalizer {
        &self.inner.normalizer
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }
}
