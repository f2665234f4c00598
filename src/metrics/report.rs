//! Aggregate a metrics stream into counts and attempts-per-success.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::warn;

use crate::error::MetricsError;

use super::event::{EventKind, MetricsEvent};

/// Read a JSONL metrics file. Unparseable lines are skipped with a warning.
pub fn read_events(path: &Path) -> Result<Vec<MetricsEvent>, MetricsError> {
    let content = std::fs::read_to_string(path).map_err(|e| MetricsError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut events = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<MetricsEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping line {} of {}: {}", idx + 1, path.display(), e),
        }
    }

    Ok(events)
}

/// Counts per event kind plus the mean number of attempts per success.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsSummary {
    pub counts: BTreeMap<EventKind, usize>,
    /// `None` when there were no successes.
    pub average_attempts_per_success: Option<f64>,
}

impl MetricsSummary {
    pub fn from_events(events: &[MetricsEvent]) -> Self {
        let mut counts = BTreeMap::new();
        let mut success_attempts = 0u64;
        let mut successes_with_attempts = 0u64;

        for event in events {
            *counts.entry(event.kind).or_insert(0) += 1;

            if event.kind == EventKind::Success
                && let Some(attempts) = event.attempt()
            {
                success_attempts += attempts;
                successes_with_attempts += 1;
            }
        }

        let average_attempts_per_success = (successes_with_attempts > 0)
            .then(|| success_attempts as f64 / successes_with_attempts as f64);

        Self {
            counts,
            average_attempts_per_success,
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in EventKind::ALL {
            writeln!(f, "{:<14} {}", kind.as_str(), self.count(kind))?;
        }
        match self.average_attempts_per_success {
            Some(avg) => write!(f, "{:<14} {:.2}", "avg_attempts", avg),
            None => write!(f, "{:<14} n/a", "avg_attempts"),
        }
    }
}
