//! Configuration loading and validation.
//!
//! All settings live in one TOML file (default `postwright.toml`). Every key
//! is optional; a missing file yields the defaults. Unknown tables and keys
//! are rejected so a misspelled setting never silently falls back to its
//! default. The file is deserialized with `toml` and validated once, then the
//! resulting [`Settings`] is passed by reference to whatever needs it.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::retry::classify::{DEFAULT_RATE_LIMIT_INDICATORS, DEFAULT_TRANSIENT_INDICATORS};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "postwright.toml";

pub const DEFAULT_RETRY_PASSES: u32 = 3;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_ERROR_PREFIX: &str = "[AI error]";
pub const DEFAULT_PROGRAM: &str = "gemini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_METRICS_PATH: &str = "logs/ai_metrics.jsonl";
pub const DEFAULT_POSTS_PER_PROMPT: u32 = 5;
pub const DEFAULT_MAX_PRODUCT_NAME_LENGTH: usize = 80;

/// Upper bound for `retry_max_backoff` and `retry_jitter_max`, in seconds.
pub const MAX_BACKOFF_LIMIT_SECS: f64 = 86_400.0;

/// Batch-level reconciliation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSettings {
    /// Reconciliation passes after the initial pass.
    pub retry_passes: u32,
    /// Items of one pass allowed in flight at once.
    pub concurrency: usize,
    /// Text starting with this tag counts as a failed result.
    pub error_prefix: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            retry_passes: DEFAULT_RETRY_PASSES,
            concurrency: DEFAULT_CONCURRENCY,
            error_prefix: DEFAULT_ERROR_PREFIX.to_string(),
        }
    }
}

/// Indicator substrings for the error classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierSettings {
    pub rate_limit_indicators: Vec<String>,
    pub transient_indicators: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            rate_limit_indicators: to_strings(DEFAULT_RATE_LIMIT_INDICATORS),
            transient_indicators: to_strings(DEFAULT_TRANSIENT_INDICATORS),
        }
    }
}

/// How to invoke the external generation command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSettings {
    pub program: String,
    /// Arguments; `{model}` and `{prompt}` are substituted per call.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: to_strings(&["--model", "{model}", "--prompt", "{prompt}"]),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSettings {
    pub path: PathBuf,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_METRICS_PATH),
        }
    }
}

/// Settings for the prompt-file pipeline.
///
/// `max_retries` and `retry_passes` override the `[retry]` and `[batch]`
/// values for this pipeline only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalSettings {
    pub posts_per_prompt: u32,
    pub max_retries: Option<u32>,
    pub retry_passes: Option<u32>,
}

impl Default for NormalSettings {
    fn default() -> Self {
        Self {
            posts_per_prompt: DEFAULT_POSTS_PER_PROMPT,
            max_retries: None,
            retry_passes: None,
        }
    }
}

/// Settings for the product-file pipeline. Overrides work as in
/// [`NormalSettings`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AffiliateSettings {
    pub max_product_name_length: usize,
    pub max_retries: Option<u32>,
    pub retry_passes: Option<u32>,
}

impl Default for AffiliateSettings {
    fn default() -> Self {
        Self {
            max_product_name_length: DEFAULT_MAX_PRODUCT_NAME_LENGTH,
            max_retries: None,
            retry_passes: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub retry: RetryPolicy,
    pub batch: BatchSettings,
    pub classifier: ClassifierSettings,
    pub command: CommandSettings,
    pub metrics: MetricsSettings,
    pub normal: NormalSettings,
    pub affiliate: AffiliateSettings,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// A missing file is not an error: defaults are returned. Any other read
    /// failure, a TOML syntax error, an unknown key, a wrongly typed value or
    /// a value that fails validation is.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml(path, &content)
    }

    /// Parse settings from TOML text. `path` is only used in error messages.
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;

        if retry.max_attempts == 0 {
            return Err(invalid("retry", "max_retries", "must be at least 1"));
        }
        for (key, value) in [
            ("retry_base_backoff", retry.base_backoff),
            ("retry_max_backoff", retry.max_backoff),
            ("retry_jitter_max", retry.jitter_max),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid("retry", key, "must be a finite, non-negative number"));
            }
        }
        if retry.max_backoff < retry.base_backoff {
            return Err(invalid(
                "retry",
                "retry_max_backoff",
                "must not be smaller than retry_base_backoff",
            ));
        }
        for (key, value) in [
            ("retry_max_backoff", retry.max_backoff),
            ("retry_jitter_max", retry.jitter_max),
        ] {
            if value > MAX_BACKOFF_LIMIT_SECS {
                return Err(invalid(
                    "retry",
                    key,
                    &format!("must not exceed {} seconds", MAX_BACKOFF_LIMIT_SECS),
                ));
            }
        }
        if !retry.rate_limit_multiplier.is_finite() || retry.rate_limit_multiplier < 1.0 {
            return Err(invalid("retry", "rate_limit_multiplier", "must be at least 1"));
        }
        if retry.model_name.trim().is_empty() {
            return Err(invalid("retry", "model_name", "must not be empty"));
        }
        if self.batch.concurrency == 0 {
            return Err(invalid("batch", "concurrency", "must be at least 1"));
        }
        if self.command.program.trim().is_empty() {
            return Err(invalid("command", "program", "must not be empty"));
        }
        if self.normal.posts_per_prompt == 0 {
            return Err(invalid("normal", "posts_per_prompt", "must be at least 1"));
        }
        if self.normal.max_retries == Some(0) {
            return Err(invalid("normal", "max_retries", "must be at least 1"));
        }
        if self.affiliate.max_retries == Some(0) {
            return Err(invalid("affiliate", "max_retries", "must be at least 1"));
        }

        Ok(())
    }

    /// Retry policy and batch settings for the prompt-file pipeline.
    pub fn normal_pipeline(&self) -> (RetryPolicy, BatchSettings) {
        self.with_overrides(self.normal.max_retries, self.normal.retry_passes)
    }

    /// Retry policy and batch settings for the product-file pipeline.
    pub fn affiliate_pipeline(&self) -> (RetryPolicy, BatchSettings) {
        self.with_overrides(self.affiliate.max_retries, self.affiliate.retry_passes)
    }

    fn with_overrides(
        &self,
        max_retries: Option<u32>,
        retry_passes: Option<u32>,
    ) -> (RetryPolicy, BatchSettings) {
        let mut retry = self.retry.clone();
        let mut batch = self.batch.clone();
        if let Some(max_retries) = max_retries {
            retry.max_attempts = max_retries;
        }
        if let Some(retry_passes) = retry_passes {
            batch.retry_passes = retry_passes;
        }
        (retry, batch)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn invalid(table: &str, key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{}.{}", table, key),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Settings, ConfigError> {
        Settings::from_toml(Path::new("test.toml"), content)
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let settings = parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry.max_attempts, 8);
        assert_eq!(settings.retry.base_backoff, 2.0);
        assert_eq!(settings.retry.max_backoff, 120.0);
        assert_eq!(settings.retry.jitter_max, 2.0);
        assert_eq!(settings.retry.rate_limit_multiplier, 6.0);
        assert_eq!(settings.batch.retry_passes, 3);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postwright.toml");
        std::fs::write(&path, "[retry]\nmax_retries = 4\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.retry.max_attempts, 4);
    }

    #[test]
    fn test_overrides_are_applied() {
        let settings = parse(
            r#"
[retry]
model_name = "gemini-1.5-pro"
max_retries = 5
retry_base_backoff = 1
retry_max_backoff = 30.5
retry_jitter_max = 0.0
rate_limit_multiplier = 4

[batch]
retry_passes = 2
concurrency = 4
error_prefix = "[ERR]"

[classifier]
rate_limit_indicators = ["quota"]
transient_indicators = []

[command]
program = "my-llm"
args = ["{prompt}"]
timeout_secs = 60

[metrics]
path = "/tmp/metrics.jsonl"

[normal]
posts_per_prompt = 2

[affiliate]
max_product_name_length = 40
"#,
        )
        .unwrap();

        assert_eq!(settings.retry.model_name, "gemini-1.5-pro");
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_backoff, 1.0);
        assert_eq!(settings.retry.max_backoff, 30.5);
        assert_eq!(settings.retry.jitter_max, 0.0);
        assert_eq!(settings.retry.rate_limit_multiplier, 4.0);
        assert_eq!(settings.batch.retry_passes, 2);
        assert_eq!(settings.batch.concurrency, 4);
        assert_eq!(settings.batch.error_prefix, "[ERR]");
        assert_eq!(settings.classifier.rate_limit_indicators, vec!["quota"]);
        assert!(settings.classifier.transient_indicators.is_empty());
        assert_eq!(settings.command.program, "my-llm");
        assert_eq!(settings.command.args, vec!["{prompt}"]);
        assert_eq!(settings.command.timeout_secs, 60);
        assert_eq!(settings.metrics.path, PathBuf::from("/tmp/metrics.jsonl"));
        assert_eq!(settings.normal.posts_per_prompt, 2);
        assert_eq!(settings.affiliate.max_product_name_length, 40);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = parse("[retry\nmax_retries = 3");
        assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn test_wrong_type_names_the_key() {
        let result = parse("[retry]\nmax_retries = \"eight\"\n");
        match result {
            Err(ConfigError::ParseFailed { reason, .. }) => {
                assert!(reason.contains("max_retries"), "reason: {}", reason)
            }
            other => panic!("Expected ParseFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_misspelled_key_rejected() {
        let result = parse("[retry]\nmax_retry = 0\n");
        match result {
            Err(ConfigError::ParseFailed { reason, .. }) => {
                assert!(reason.contains("max_retry"), "reason: {}", reason)
            }
            other => panic!("Expected ParseFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_misspelled_table_rejected() {
        let result = parse("[batchh]\nretry_passes = 99\n");
        match result {
            Err(ConfigError::ParseFailed { reason, .. }) => {
                assert!(reason.contains("batchh"), "reason: {}", reason)
            }
            other => panic!("Expected ParseFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_retries_rejected() {
        let result = parse("[retry]\nmax_retries = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_negative_integer_rejected() {
        let result = parse("[batch]\nretry_passes = -1\n");
        assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn test_max_backoff_below_base_rejected() {
        let result = parse("[retry]\nretry_base_backoff = 10.0\nretry_max_backoff = 5.0\n");
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "retry.retry_max_backoff")
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_backoff_rejected() {
        let result = parse("[retry]\nretry_base_backoff = 1e20\nretry_max_backoff = 1e20\n");
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "retry.retry_max_backoff")
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_jitter_rejected() {
        let result = parse("[retry]\nretry_jitter_max = 1e20\n");
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "retry.retry_jitter_max")
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_backoff_at_limit_allowed() {
        let settings =
            parse("[retry]\nretry_max_backoff = 86400\nretry_jitter_max = 86400\n").unwrap();
        assert_eq!(settings.retry.max_backoff, MAX_BACKOFF_LIMIT_SECS);
    }

    #[test]
    fn test_multiplier_below_one_rejected() {
        let result = parse("[retry]\nrate_limit_multiplier = 0.5\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = parse("[batch]\nconcurrency = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_retry_passes_allowed() {
        let settings = parse("[batch]\nretry_passes = 0\n").unwrap();
        assert_eq!(settings.batch.retry_passes, 0);
    }

    #[test]
    fn test_indicator_list_with_non_string_rejected() {
        let result = parse("[classifier]\nrate_limit_indicators = [\"429\", 7]\n");
        assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn test_pipelines_inherit_shared_settings() {
        let settings = parse("[retry]\nmax_retries = 4\n[batch]\nretry_passes = 2\n").unwrap();

        let (normal_retry, normal_batch) = settings.normal_pipeline();
        let (affiliate_retry, affiliate_batch) = settings.affiliate_pipeline();
        assert_eq!(normal_retry, settings.retry);
        assert_eq!(normal_batch, settings.batch);
        assert_eq!(affiliate_retry.max_attempts, 4);
        assert_eq!(affiliate_batch.retry_passes, 2);
    }

    #[test]
    fn test_pipeline_overrides_apply_per_pipeline() {
        let settings = parse(
            r#"
[retry]
max_retries = 4
retry_base_backoff = 1.5

[batch]
retry_passes = 2
concurrency = 3

[normal]
retry_passes = 0

[affiliate]
max_retries = 6
retry_passes = 5
"#,
        )
        .unwrap();

        let (normal_retry, normal_batch) = settings.normal_pipeline();
        assert_eq!(normal_retry.max_attempts, 4);
        assert_eq!(normal_batch.retry_passes, 0);
        assert_eq!(normal_batch.concurrency, 3);

        let (affiliate_retry, affiliate_batch) = settings.affiliate_pipeline();
        assert_eq!(affiliate_retry.max_attempts, 6);
        assert_eq!(affiliate_retry.base_backoff, 1.5);
        assert_eq!(affiliate_batch.retry_passes, 5);
        assert_eq!(affiliate_batch.concurrency, 3);

        // Shared sections are untouched.
        assert_eq!(settings.retry.max_attempts, 4);
        assert_eq!(settings.batch.retry_passes, 2);
    }

    #[test]
    fn test_zero_pipeline_max_retries_rejected() {
        let result = parse("[affiliate]\nmax_retries = 0\n");
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "affiliate.max_retries"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }
}
