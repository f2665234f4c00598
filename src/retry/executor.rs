//! Drive one generation request through its retry budget.

use std::sync::{Arc, Mutex};

use backoff::backoff::Backoff;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::generation::{Generator, normalize_response};
use crate::metrics::{EventKind, MetricsEvent, MetricsSink};

use super::backoff::PolicyBackoff;
use super::classify::{Classification, ErrorClassifier};
use super::policy::RetryPolicy;

/// Text returned when a call produced nothing. Callers must treat empty
/// output as failure, never as content.
pub const FAILURE_SENTINEL: &str = "";

/// One unit of generation work. Built once per work item and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    label: String,
    policy: RetryPolicy,
}

impl GenerationRequest {
    /// `label` identifies the work item in metrics and logs.
    pub fn new(prompt: impl Into<String>, label: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            prompt: prompt.into(),
            label: label.into(),
            policy,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(String),
    Failure {
        error: String,
        classification: Classification,
    },
}

/// Result of a whole call: the text and whether it is real output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    /// Generated text, or [`FAILURE_SENTINEL`] on failure.
    pub text: String,
    pub succeeded: bool,
    /// Attempts actually made.
    pub attempts: u32,
    /// The call stopped early because of a shutdown request.
    pub cancelled: bool,
}

impl CallResult {
    pub fn success(text: impl Into<String>, attempts: u32) -> Self {
        Self {
            text: text.into(),
            succeeded: true,
            attempts,
            cancelled: false,
        }
    }

    pub fn failure(attempts: u32) -> Self {
        Self {
            text: FAILURE_SENTINEL.to_string(),
            succeeded: false,
            attempts,
            cancelled: false,
        }
    }

    fn cancelled(attempts: u32) -> Self {
        Self {
            cancelled: true,
            ..Self::failure(attempts)
        }
    }

    pub fn into_parts(self) -> (String, bool) {
        (self.text, self.succeeded)
    }
}

/// Calls a [`Generator`] until it yields text or the request's attempt
/// budget is spent.
///
/// Never returns an error: total failure is reported as
/// `(FAILURE_SENTINEL, false)`. Every attempt leaves a trail of
/// [`MetricsEvent`]s in the configured sink.
pub struct CallExecutor<G> {
    generator: G,
    classifier: ErrorClassifier,
    metrics: Arc<dyn MetricsSink>,
    rng: Mutex<StdRng>,
    cancel: CancellationToken,
}

impl<G: Generator> CallExecutor<G> {
    pub fn new(generator: G, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            generator,
            classifier: ErrorClassifier::default(),
            metrics,
            rng: Mutex::new(StdRng::from_entropy()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Seed the jitter source, making backoff waits reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Abort in-flight calls and backoff sleeps when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Run the request to success or exhaustion.
    pub async fn execute(&self, request: &GenerationRequest) -> CallResult {
        let policy = request.policy();
        let label = request.label();
        let max_attempts = policy.max_attempts.max(1);
        let mut schedule = PolicyBackoff::new(policy, self.call_rng());

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return self.give_up_cancelled(label, attempt - 1);
            }

            self.emit(
                MetricsEvent::new(EventKind::RequestStart).with("attempt", attempt),
                label,
            );

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(label, attempt, "Cancelled while a call was in flight");
                    return self.give_up_cancelled(label, attempt);
                }
                outcome = self.attempt(request) => outcome,
            };

            let (error, classification) = match outcome {
                AttemptOutcome::Success(text) => {
                    self.emit(
                        MetricsEvent::new(EventKind::Success).with("attempts", attempt),
                        label,
                    );
                    debug!(label, attempts = attempt, "Generation succeeded");
                    return CallResult::success(text, attempt);
                }
                AttemptOutcome::Failure {
                    error,
                    classification,
                } => (error, classification),
            };

            self.emit(
                MetricsEvent::new(EventKind::Error)
                    .with("attempt", attempt)
                    .with("error", error.as_str()),
                label,
            );
            if classification.is_rate_limited() {
                self.emit(
                    MetricsEvent::new(EventKind::RateLimited).with("attempt", attempt),
                    label,
                );
            }

            if attempt == max_attempts {
                warn!(
                    label,
                    "All {} attempts failed, returning an empty result. Last error: {}",
                    max_attempts,
                    error
                );
                self.emit(
                    MetricsEvent::new(EventKind::FinalFailure)
                        .with("attempts", attempt)
                        .with("error", error.as_str()),
                    label,
                );
                return CallResult::failure(attempt);
            }

            schedule.observe(classification);
            let wait = schedule.next_backoff().unwrap_or_default();
            let (backoff_secs, jitter_secs) = schedule
                .last_decision()
                .map(|d| (d.base_secs, d.jitter_secs))
                .unwrap_or_default();

            warn!(
                label,
                attempt,
                max_attempts,
                classification = %classification,
                indicator = self.classifier.matched_indicator(&error).unwrap_or("-"),
                "Attempt failed: {}. Retrying in {:.1}s (backoff {:.1}s)",
                error,
                wait.as_secs_f64(),
                backoff_secs
            );
            self.emit(
                MetricsEvent::new(EventKind::RetryAttempt)
                    .with("attempt", attempt)
                    .with("max_retries", max_attempts)
                    .with("error", error.as_str())
                    .with("is_rate_limit", classification.is_rate_limited())
                    .with("backoff", backoff_secs)
                    .with("jitter", jitter_secs)
                    .with("sleep_time", wait.as_secs_f64()),
                label,
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return self.give_up_cancelled(label, attempt);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        CallResult::failure(max_attempts)
    }

    async fn attempt(&self, request: &GenerationRequest) -> AttemptOutcome {
        let response = self
            .generator
            .generate(request.prompt(), &request.policy().model_name)
            .await
            .and_then(|raw| normalize_response(&raw));

        match response {
            Ok(text) => AttemptOutcome::Success(text),
            Err(e) => {
                let error = e.to_string();
                let classification = self.classifier.classify(&error);
                AttemptOutcome::Failure {
                    error,
                    classification,
                }
            }
        }
    }

    fn give_up_cancelled(&self, label: &str, attempts: u32) -> CallResult {
        warn!(label, attempts, "Generation cancelled, returning an empty result");
        self.emit(
            MetricsEvent::new(EventKind::FinalFailure)
                .with("attempts", attempts)
                .with("cancelled", true),
            label,
        );
        CallResult::cancelled(attempts)
    }

    fn emit(&self, event: MetricsEvent, label: &str) {
        let event = if label.is_empty() {
            event
        } else {
            event.with("label", label)
        };
        self.metrics.record(event);
    }

    /// Derive a per-call jitter source from the shared one.
    fn call_rng(&self) -> StdRng {
        let mut shared = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        StdRng::seed_from_u64(shared.r#gen())
    }
}
