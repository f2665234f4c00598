//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use postwright::error::GenerationError;
use postwright::generation::Generator;
use postwright::retry::RetryPolicy;

/// Get the path to test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Read a fixture file as a string.
pub fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {:?}: {}", path, e))
}

/// Create a temporary directory for test output.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Policy with the given attempt budget and no jitter.
pub fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        jitter_max: 0.0,
        ..RetryPolicy::default()
    }
}

/// How a scripted prompt behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Fail this many times, then answer with the given text.
    FailThenAnswer(u32, String),
    /// Fail every time.
    AlwaysFail,
}

/// Generator driven by scripts keyed on a prompt fragment. The first key
/// contained in the prompt picks the script, so keep keys distinct. Prompts
/// matching no key echo back.
///
/// Failures carry `error`, so tests can steer classification.
pub struct ScriptedGenerator {
    scripts: HashMap<String, Script>,
    error: String,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            error: "connection reset by peer".to_string(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(mut self, prompt: &str, script: Script) -> Self {
        self.scripts.insert(prompt.to_string(), script);
        self
    }

    pub fn failing_with(mut self, error: &str) -> Self {
        self.error = error.to_string();
        self
    }

    /// Number of `generate` calls seen for a script key (or unscripted prompt).
    pub fn calls(&self, key: &str) -> u32 {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _model: &str) -> Result<String, GenerationError> {
        let matched = self
            .scripts
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()));
        let key = matched.map_or(prompt, |(key, _)| key.as_str());

        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(key.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        match matched.map(|(_, script)| script) {
            Some(Script::AlwaysFail) => Err(GenerationError::Failed(self.error.clone())),
            Some(Script::FailThenAnswer(failures, _)) if call <= *failures => {
                Err(GenerationError::Failed(self.error.clone()))
            }
            Some(Script::FailThenAnswer(_, text)) => Ok(text.clone()),
            None => Ok(format!("echo: {}", prompt)),
        }
    }
}
