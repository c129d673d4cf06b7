//! Observability: the request metric registry, log sinks, the fan-out logger
//! that feeds them, and the `tracing` bridge into that logger.

pub mod layer;
pub mod logger;
pub mod metrics;
pub mod sinks;

pub use layer::SinkLayer;
pub use logger::FanoutLogger;
pub use metrics::{MetricRegistry, MetricSample};
pub use sinks::{Sink, SinkError};
