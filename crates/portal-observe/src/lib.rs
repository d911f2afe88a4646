//! Observability layer for the portal gateway.
//!
//! Provides the structured logger used by every component, the console-style
//! log sinks it writes to, and the fire-and-forget metrics sink it forwards
//! counters to.

pub mod entry;
pub mod logger;
pub mod metrics;
pub mod sink;

pub use entry::{LogEntry, LogOptions};
pub use logger::{LoggerOptions, LoggerPatch, StructuredLogger};
pub use metrics::{
    Delivery, Dimension, MemoryMetricsBackend, MetricSample, MetricUnit, MetricsBackend,
    MetricsSink,
};
pub use sink::{LogSink, MemorySink, TracingSink};
