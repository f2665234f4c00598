//! The opaque generation call.

use async_trait::async_trait;

use crate::error::GenerationError;

/// A text generation backend.
///
/// Implementations return the backend's raw output; the executor passes it
/// through [`normalize_response`](super::normalize_response) before deciding
/// whether the attempt succeeded. This abstraction allows mocking the backend
/// in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one generation for `prompt` with the given model.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GenerationError>;
}
