//! Free-form posts: each prompt is sent several times and every answer
//! becomes one output line.

use std::path::Path;

use async_trait::async_trait;

use crate::error::OutputError;
use crate::generation::Generator;
use crate::retry::{CallExecutor, CallResult, GenerateOne, GenerationRequest, RetryPolicy, WorkItem};

use super::sanitize::escape_newlines;

/// Read prompts from a file, one per non-blank line.
pub fn read_prompts(path: &Path) -> Result<Vec<String>, OutputError> {
    let content = std::fs::read_to_string(path).map_err(|e| OutputError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Expand prompts into work items, `posts_per_prompt` per prompt.
///
/// Labels look like `prompt2-post3` and are 1-based.
pub fn plan_requests(
    prompts: &[String],
    posts_per_prompt: u32,
    policy: &RetryPolicy,
) -> Vec<WorkItem<GenerationRequest>> {
    prompts
        .iter()
        .enumerate()
        .flat_map(|(i, prompt)| {
            (1..=posts_per_prompt).map(move |j| {
                WorkItem::new(GenerationRequest::new(
                    prompt.as_str(),
                    format!("prompt{}-post{}", i + 1, j),
                    policy.clone(),
                ))
            })
        })
        .collect()
}

/// Generates one single-line post per request.
pub struct NormalPosts<'a, G> {
    executor: &'a CallExecutor<G>,
}

impl<'a, G: Generator> NormalPosts<'a, G> {
    pub fn new(executor: &'a CallExecutor<G>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<'a, G: Generator> GenerateOne<GenerationRequest> for NormalPosts<'a, G> {
    async fn generate_one(&self, request: &GenerationRequest) -> CallResult {
        let result = self.executor.execute(request).await;
        if !result.succeeded {
            return result;
        }
        CallResult::success(escape_newlines(&result.text), result.attempts)
    }
}
