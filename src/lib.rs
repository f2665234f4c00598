//! postwright - batch post generation on top of a resilient generation executor.
//!
//! # Overview
//!
//! Every generation call goes through [`retry::CallExecutor`], which retries
//! with exponential backoff (longer for rate limits) and records each attempt
//! in a [`metrics::MetricsSink`]. Batches run through
//! [`retry::BatchReconciler`], which re-runs only the items that are still
//! failed for a bounded number of passes.

pub mod config;
pub mod error;
pub mod generation;
pub mod metrics;
pub mod post;
pub mod retry;

// Re-export commonly used types
pub use config::Settings;
pub use error::{ConfigError, GenerationError, MetricsError, OutputError};
pub use generation::{CommandGenerator, Generator};
pub use metrics::{EventKind, JsonlSink, MemorySink, MetricsEvent, MetricsSink, MetricsSummary, NoopSink};
pub use retry::{
    BatchReconciler, BatchReport, CallExecutor, CallResult, Classification, ErrorClassifier,
    GenerateOne, GenerationRequest, ItemState, RetryPolicy, WorkItem,
};
