//! Metrics sinks.
//!
//! Recording never fails from the caller's point of view: a sink that cannot
//! persist an event drops it and logs at debug level.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::event::{EventKind, MetricsEvent};

/// Append-only event recorder, shared between concurrent calls.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _event: MetricsEvent) {}
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MetricsEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<MetricsEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events).iter().filter(|e| e.kind == kind).count()
    }

    /// Events carrying the given `label` payload field.
    pub fn events_for(&self, label: &str) -> Vec<MetricsEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.label() == Some(label))
            .cloned()
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, event: MetricsEvent) {
        lock(&self.events).push(event);
    }
}

/// Appends one JSON object per line to a file.
///
/// The file and its parent directory are created on the first write. Writes
/// from concurrent callers are serialized through a mutex.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> std::io::Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn try_record(&self, event: &MetricsEvent) -> std::io::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut guard = lock(&self.file);
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }
}

impl MetricsSink for JsonlSink {
    fn record(&self, event: MetricsEvent) {
        if let Err(e) = self.try_record(&event) {
            debug!(
                "Dropping {} metrics event, cannot write {}: {}",
                event.kind,
                self.path.display(),
                e
            );
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record(MetricsEvent::new(EventKind::RequestStart).with("attempt", 1));
        sink.record(MetricsEvent::new(EventKind::Error).with("attempt", 1));
        sink.record(MetricsEvent::new(EventKind::RequestStart).with("attempt", 2));

        let kinds: Vec<EventKind> = sink.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::RequestStart, EventKind::Error, EventKind::RequestStart]
        );
        assert_eq!(sink.count(EventKind::RequestStart), 2);
    }

    #[test]
    fn test_memory_sink_filters_by_label() {
        let sink = MemorySink::new();
        sink.record(MetricsEvent::new(EventKind::Success).with("label", "a"));
        sink.record(MetricsEvent::new(EventKind::FinalFailure).with("label", "b"));

        let b = sink.events_for("b");
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].kind, EventKind::FinalFailure);
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("ai_metrics.jsonl");
        let sink = JsonlSink::new(&path);

        sink.record(MetricsEvent::new(EventKind::RequestStart).with("attempt", 1));
        sink.record(MetricsEvent::new(EventKind::Success).with("attempts", 1));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: MetricsEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, EventKind::Success);
    }

    #[test]
    fn test_jsonl_sink_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        std::fs::write(&path, "{\"existing\":true}\n").unwrap();

        JsonlSink::new(&path).record(MetricsEvent::new(EventKind::Error));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("{\"existing\":true}"));
    }

    #[test]
    fn test_jsonl_sink_swallows_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let sink = JsonlSink::new(dir.path());
        sink.record(MetricsEvent::new(EventKind::Error));
    }

    #[test]
    fn test_jsonl_sink_concurrent_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let sink = Arc::new(JsonlSink::new(&path));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        sink.record(
                            MetricsEvent::new(EventKind::RequestStart)
                                .with("thread", t)
                                .with("attempt", i),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 100);
        for line in content.lines() {
            serde_json::from_str::<MetricsEvent>(line).unwrap();
        }
    }
}
