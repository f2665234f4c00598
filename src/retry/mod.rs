//! Resilient generation executor: backoff, error classification, per-call
//! retry and batch reconciliation.

pub mod backoff;
pub mod batch;
pub mod classify;
pub mod executor;
pub mod policy;

pub use self::backoff::{BackoffDecision, PolicyBackoff, compute_backoff};
pub use batch::{BatchReconciler, BatchReport, GenerateOne, ItemState, WorkItem, is_failure_text};
pub use classify::{Classification, ErrorClassifier};
pub use executor::{AttemptOutcome, CallExecutor, CallResult, FAILURE_SENTINEL, GenerationRequest};
pub use policy::RetryPolicy;
