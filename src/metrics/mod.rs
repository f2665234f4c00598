//! Append-only metrics trail for generation calls.

pub mod event;
pub mod report;
pub mod sink;

pub use event::{EventKind, MetricsEvent};
pub use report::{MetricsSummary, read_events};
pub use sink::{JsonlSink, MemorySink, MetricsSink, NoopSink};
