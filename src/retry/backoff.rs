//! Exponential backoff with a rate-limit multiplier and additive jitter.

use std::time::Duration;

use backoff::backoff::Backoff;
use rand::Rng;

use super::classify::Classification;
use super::policy::RetryPolicy;

/// Doubling stops here; the cap takes over long before.
const MAX_EXPONENT: u32 = 63;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffDecision {
    /// Exponential delay after the rate-limit multiplier and the cap.
    pub base_secs: f64,
    pub jitter_secs: f64,
    /// `base_secs + jitter_secs`; not capped again.
    pub total_secs: f64,
}

impl BackoffDecision {
    /// The total as a [`Duration`], saturating at [`Duration::MAX`].
    pub fn sleep_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.total_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Compute the wait after a failed `attempt` (1-indexed).
///
/// The base delay is `base_backoff * 2^(attempt-1)`, multiplied by
/// `rate_limit_multiplier` when the failure was rate limited, then capped at
/// `max_backoff`. Jitter drawn uniformly from `[0, jitter_max]` is added on
/// top of the capped value, so the total can slightly exceed the cap.
///
/// An attempt of 0 is treated as 1.
pub fn compute_backoff<R: Rng + ?Sized>(
    attempt: u32,
    is_rate_limited: bool,
    policy: &RetryPolicy,
    rng: &mut R,
) -> BackoffDecision {
    let exponent = attempt.max(1).saturating_sub(1).min(MAX_EXPONENT);
    let mut base = policy.base_backoff * 2f64.powi(exponent as i32);

    if is_rate_limited {
        base *= policy.rate_limit_multiplier;
    }

    let base_secs = base.min(policy.max_backoff);

    let jitter_secs = if policy.jitter_max > 0.0 {
        rng.gen_range(0.0..=policy.jitter_max)
    } else {
        0.0
    };

    BackoffDecision {
        base_secs,
        jitter_secs,
        total_secs: base_secs + jitter_secs,
    }
}

/// Per-call backoff schedule driven by [`compute_backoff`].
///
/// The executor records each failure's classification with [`observe`]
/// and then asks [`Backoff::next_backoff`] for the wait. Every call to
/// `next_backoff` advances the attempt counter by one.
///
/// [`observe`]: PolicyBackoff::observe
pub struct PolicyBackoff<'a, R: Rng> {
    policy: &'a RetryPolicy,
    rng: R,
    attempt: u32,
    rate_limited: bool,
    last: Option<BackoffDecision>,
}

impl<'a, R: Rng> PolicyBackoff<'a, R> {
    pub fn new(policy: &'a RetryPolicy, rng: R) -> Self {
        Self {
            policy,
            rng,
            attempt: 0,
            rate_limited: false,
            last: None,
        }
    }

    /// Record the classification of the failure the next wait is for.
    pub fn observe(&mut self, classification: Classification) {
        self.rate_limited = classification.is_rate_limited();
    }

    /// The decision behind the most recent `next_backoff` call.
    pub fn last_decision(&self) -> Option<BackoffDecision> {
        self.last
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl<R: Rng> Backoff for PolicyBackoff<'_, R> {
    fn reset(&mut self) {
        self.attempt = 0;
        self.rate_limited = false;
        self.last = None;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        let decision = compute_backoff(self.attempt, self.rate_limited, self.policy, &mut self.rng);
        self.last = Some(decision);
        Some(decision.sleep_duration())
    }
}
