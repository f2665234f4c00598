//! Metrics event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds of call lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RequestStart,
    Success,
    Error,
    RateLimited,
    FinalFailure,
    RetryAttempt,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::RequestStart,
        EventKind::Success,
        EventKind::Error,
        EventKind::RateLimited,
        EventKind::FinalFailure,
        EventKind::RetryAttempt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RequestStart => "request_start",
            EventKind::Success => "success",
            EventKind::Error => "error",
            EventKind::RateLimited => "rate_limited",
            EventKind::FinalFailure => "final_failure",
            EventKind::RetryAttempt => "retry_attempt",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metrics record. Serialized as a single JSON line:
/// `{"timestamp": ..., "event": "success", "info": {"attempts": 1}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(rename = "info", default)]
    pub payload: Map<String, Value>,
}

impl MetricsEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            payload: Map::new(),
        }
    }

    /// Add a payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.payload.get("label").and_then(Value::as_str)
    }

    /// The `attempt` field, falling back to `attempts`.
    pub fn attempt(&self) -> Option<u64> {
        self.payload
            .get("attempt")
            .or_else(|| self.payload.get("attempts"))
            .and_then(Value::as_u64)
    }
}
