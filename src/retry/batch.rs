//! Batch reconciliation: run every item once, then re-run only the items
//! still holding a failed result, for a bounded number of passes.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BatchSettings;
use crate::generation::Generator;

use super::executor::{CallExecutor, CallResult, FAILURE_SENTINEL, GenerationRequest};

/// Produces a result for one work item payload.
///
/// The per-call retry loop lives behind this trait; the reconciler only
/// decides which items get another call.
#[async_trait]
pub trait GenerateOne<P: Sync>: Send + Sync {
    async fn generate_one(&self, payload: &P) -> CallResult;
}

#[async_trait]
impl<G: Generator> GenerateOne<GenerationRequest> for CallExecutor<G> {
    async fn generate_one(&self, request: &GenerationRequest) -> CallResult {
        self.execute(request).await
    }
}

/// Whether `text` stands for "no result": blank, or tagged with the error
/// prefix some generators put in front of failure messages.
pub fn is_failure_text(text: &str, error_prefix: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || (!error_prefix.is_empty() && trimmed.starts_with(error_prefix))
}

/// Lifecycle of a work item's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    /// Not yet produced a usable result.
    Unresolved,
    Resolved(String),
    /// Every call and every reconciliation pass failed.
    Exhausted,
}

/// A batch slot: the caller's payload plus its best-known result.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<P> {
    pub payload: P,
    state: ItemState,
}

impl<P> WorkItem<P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            state: ItemState::Unresolved,
        }
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, ItemState::Resolved(_))
    }

    /// The resolved text, or the failure sentinel.
    pub fn text(&self) -> &str {
        match &self.state {
            ItemState::Resolved(text) => text,
            _ => FAILURE_SENTINEL,
        }
    }

    /// Record a call result. A resolved item is never overwritten.
    fn apply(&mut self, result: CallResult, error_prefix: &str) {
        if self.is_resolved() {
            return;
        }
        if result.succeeded && !is_failure_text(&result.text, error_prefix) {
            self.state = ItemState::Resolved(result.text);
        }
    }

    fn exhaust(&mut self) {
        if !self.is_resolved() {
            self.state = ItemState::Exhausted;
        }
    }
}

/// Outcome of one `reconcile` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Reconciliation passes run after the initial pass.
    pub passes_run: u32,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved == 0
    }
}

/// Runs batches of work items with bounded reconciliation passes.
///
/// Each pass is a barrier: all calls of a pass settle before the next
/// pending set is computed. Within a pass up to `concurrency` items are in
/// flight, each with a single call. No state survives between `reconcile`
/// runs.
#[derive(Debug, Clone)]
pub struct BatchReconciler {
    max_passes: u32,
    concurrency: usize,
    error_prefix: String,
    cancel: CancellationToken,
}

impl BatchReconciler {
    pub fn new(max_passes: u32) -> Self {
        Self {
            max_passes,
            concurrency: 1,
            error_prefix: String::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_settings(settings: &BatchSettings) -> Self {
        Self::new(settings.retry_passes)
            .with_concurrency(settings.concurrency)
            .with_error_prefix(settings.error_prefix.clone())
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_error_prefix(mut self, error_prefix: impl Into<String>) -> Self {
        self.error_prefix = error_prefix.into();
        self
    }

    /// Stop starting new calls and passes once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Resolve as many `items` as possible.
    ///
    /// Every item gets one call; items still failed then get up to
    /// `max_passes` more, one per pass, in original order. On return every
    /// item is either resolved or exhausted.
    pub async fn reconcile<P, F>(&self, items: &mut [WorkItem<P>], generate_one: &F) -> BatchReport
    where
        P: Sync,
        F: GenerateOne<P> + ?Sized,
    {
        let all: Vec<usize> = (0..items.len()).collect();
        self.run_pass(items, &all, generate_one).await;

        let mut pending: Vec<usize> = all.into_iter().filter(|&i| !items[i].is_resolved()).collect();
        let mut passes_run = 0;

        for pass in 1..=self.max_passes {
            if pending.is_empty() || self.cancel.is_cancelled() {
                break;
            }

            info!(
                "Reconciliation pass {}/{}: retrying {} failed item(s)",
                pass,
                self.max_passes,
                pending.len()
            );

            self.run_pass(items, &pending, generate_one).await;
            pending.retain(|&i| !items[i].is_resolved());
            passes_run = pass;
        }

        for item in items.iter_mut() {
            item.exhaust();
        }

        let resolved = items.iter().filter(|item| item.is_resolved()).count();
        let report = BatchReport {
            total: items.len(),
            resolved,
            unresolved: items.len() - resolved,
            passes_run,
            cancelled: self.cancel.is_cancelled(),
        };

        if report.unresolved > 0 {
            warn!(
                "Batch finished with {} of {} item(s) unresolved after {} reconciliation pass(es)",
                report.unresolved, report.total, report.passes_run
            );
        } else {
            info!("Batch finished: all {} item(s) resolved", report.total);
        }

        report
    }

    async fn run_pass<P, F>(&self, items: &mut [WorkItem<P>], indices: &[usize], generate_one: &F)
    where
        P: Sync,
        F: GenerateOne<P> + ?Sized,
    {
        let results: Vec<(usize, Option<CallResult>)> = {
            let slots: &[WorkItem<P>] = items;
            stream::iter(indices.iter().copied())
                .map(|idx| async move {
                    if self.cancel.is_cancelled() {
                        return (idx, None);
                    }
                    (idx, Some(generate_one.generate_one(&slots[idx].payload).await))
                })
                .buffered(self.concurrency)
                .collect()
                .await
        };

        for (idx, result) in results {
            if let Some(result) = result {
                items[idx].apply(result, &self.error_prefix);
            }
        }
    }
}
