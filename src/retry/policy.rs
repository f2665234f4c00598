//! Per-request retry configuration.

use serde::Deserialize;

pub const DEFAULT_MODEL_NAME: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_BASE_BACKOFF_SECS: f64 = 2.0;
pub const DEFAULT_MAX_BACKOFF_SECS: f64 = 120.0;
pub const DEFAULT_JITTER_MAX_SECS: f64 = 2.0;
pub const DEFAULT_RATE_LIMIT_MULTIPLIER: f64 = 6.0;

/// Retry settings snapshotted into every request.
///
/// Durations are in seconds, matching the configuration file. Field
/// renames follow the `[retry]` table keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub model_name: String,
    /// Total attempts per call, including the first one.
    #[serde(rename = "max_retries")]
    pub max_attempts: u32,
    #[serde(rename = "retry_base_backoff")]
    pub base_backoff: f64,
    /// Cap applied to the base delay. Jitter may exceed it.
    #[serde(rename = "retry_max_backoff")]
    pub max_backoff: f64,
    #[serde(rename = "retry_jitter_max")]
    pub jitter_max: f64,
    /// Applied to the base delay when the upstream signals rate limiting.
    pub rate_limit_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF_SECS,
            max_backoff: DEFAULT_MAX_BACKOFF_SECS,
            jitter_max: DEFAULT_JITTER_MAX_SECS,
            rate_limit_multiplier: DEFAULT_RATE_LIMIT_MULTIPLIER,
        }
    }
}
