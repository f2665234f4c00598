//! Affiliate posts: a short catch copy per product, followed by its link.

use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use crate::error::OutputError;
use crate::generation::Generator;
use crate::retry::{CallExecutor, CallResult, GenerateOne, GenerationRequest, RetryPolicy};

use super::sanitize::{ESCAPED_NEWLINE, escape_newlines, hashtags_on_own_line, strip_urls};

/// A product line from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub short_url: String,
}

/// Parse tab-separated `name<TAB>short_url` lines.
///
/// Blank lines are ignored. Lines without both fields are skipped with a
/// warning; extra columns are ignored.
pub fn parse_products(content: &str) -> Vec<Product> {
    let mut products = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t').map(str::trim);
        match (fields.next(), fields.next()) {
            (Some(name), Some(url)) if !name.is_empty() && !url.is_empty() => {
                products.push(Product {
                    name: name.to_string(),
                    short_url: url.to_string(),
                });
            }
            _ => warn!("Skipping line {}: expected name<TAB>short_url", line_no + 1),
        }
    }

    products
}

pub fn read_products(path: &Path) -> Result<Vec<Product>, OutputError> {
    let content = std::fs::read_to_string(path).map_err(|e| OutputError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_products(&content))
}

/// First `max_chars` characters of `name`.
fn truncate_name(name: &str, max_chars: usize) -> &str {
    match name.char_indices().nth(max_chars) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

fn build_prompt(product_name: &str) -> String {
    format!(
        r#"Write a post for X (formerly Twitter) about the product below.
Never include a URL in the text.

Product name:
{product_name}

Requirements:
- At most 50 characters
- Reads like a catchy, natural copy line, not an advert
- Exactly one emoji
- A single line with no line breaks"#
    )
}

/// Turn a raw answer into the final post, or `None` if nothing usable is
/// left once URLs are removed.
pub fn compose_post(generated: &str, short_url: &str) -> Option<String> {
    let text = strip_urls(generated);
    if text.is_empty() {
        return None;
    }
    let text = hashtags_on_own_line(&escape_newlines(&text));
    Some(format!("{text}{ESCAPED_NEWLINE}{ESCAPED_NEWLINE}{short_url}"))
}

/// Generates one affiliate post per [`Product`].
pub struct AffiliatePosts<'a, G> {
    executor: &'a CallExecutor<G>,
    policy: RetryPolicy,
    max_name_length: usize,
}

impl<'a, G: Generator> AffiliatePosts<'a, G> {
    pub fn new(executor: &'a CallExecutor<G>, policy: RetryPolicy, max_name_length: usize) -> Self {
        Self {
            executor,
            policy,
            max_name_length,
        }
    }

    fn request_for(&self, product: &Product) -> GenerationRequest {
        let name = truncate_name(&product.name, self.max_name_length);
        GenerationRequest::new(build_prompt(name), name, self.policy.clone())
    }
}

#[async_trait]
impl<'a, G: Generator> GenerateOne<Product> for AffiliatePosts<'a, G> {
    async fn generate_one(&self, product: &Product) -> CallResult {
        let result = self.executor.execute(&self.request_for(product)).await;
        if !result.succeeded {
            return result;
        }

        match compose_post(&result.text, &product.short_url) {
            Some(post) => CallResult::success(post, result.attempts),
            None => {
                warn!(product = %product.name, "Answer contained nothing but URLs");
                CallResult::failure(result.attempts)
            }
        }
    }
}
