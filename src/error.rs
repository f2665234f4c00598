//! Error types for postwright modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single call to the text generation backend.
///
/// These never escape the call executor; they are turned into strings and
/// classified. Keep the messages free of the word fragments the classifier
/// treats as rate-limit indicators.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to spawn backend process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Backend process timed out after {0} seconds")]
    Timeout(u64),

    #[error("Backend exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Backend returned an empty response")]
    EmptyResponse,

    #[error("Backend returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Backend call failed: {0}")]
    Failed(String),
}

/// Errors from loading and validating the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors from reading post inputs and writing output files.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to read input file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create temporary file next to {path}: {source}")]
    TempFileFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from reading a metrics file back for reporting.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to read metrics file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
