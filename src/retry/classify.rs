//! Map raw error text to a coarse retry classification.

use crate::config::ClassifierSettings;

/// Substrings that mark an error as rate limiting.
pub const DEFAULT_RATE_LIMIT_INDICATORS: &[&str] = &["resource_exhausted", "429", "rate"];

/// Substrings of common transient network failures.
pub const DEFAULT_TRANSIENT_INDICATORS: &[&str] =
    &["timeout", "timed out", "connection refused", "connection reset"];

/// Coarse error classification driving the backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Upstream quota or throughput exhaustion; waits are multiplied.
    RateLimited,
    /// Anything else, including unrecognized errors.
    Transient,
}

impl Classification {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Classification::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::RateLimited => "rate_limited",
            Classification::Transient => "transient",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive substring classifier.
///
/// Rate-limit indicators win over transient ones. Text matching neither list
/// is still [`Classification::Transient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorClassifier {
    rate_limit_indicators: Vec<String>,
    transient_indicators: Vec<String>,
}

impl ErrorClassifier {
    pub fn new<I, J, S, T>(rate_limit_indicators: I, transient_indicators: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            rate_limit_indicators: normalize(rate_limit_indicators),
            transient_indicators: normalize(transient_indicators),
        }
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self::new(
            &settings.rate_limit_indicators,
            &settings.transient_indicators,
        )
    }

    pub fn classify(&self, error_text: &str) -> Classification {
        let text = error_text.to_lowercase();

        if self
            .rate_limit_indicators
            .iter()
            .any(|ind| text.contains(ind.as_str()))
        {
            Classification::RateLimited
        } else {
            Classification::Transient
        }
    }

    /// The first configured indicator found in `error_text`, if any.
    ///
    /// Only used for logging which known failure mode was hit.
    pub fn matched_indicator(&self, error_text: &str) -> Option<&str> {
        let text = error_text.to_lowercase();
        self.rate_limit_indicators
            .iter()
            .chain(self.transient_indicators.iter())
            .find(|ind| text.contains(ind.as_str()))
            .map(String::as_str)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_INDICATORS, DEFAULT_TRANSIENT_INDICATORS)
    }
}

fn normalize<I, S>(indicators: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    indicators
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
