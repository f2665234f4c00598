//! Normalize raw backend output into post text.
//!
//! Backends answer in one of three shapes:
//! - a JSON object with a direct `text` field,
//! - a JSON object with `candidates[0].content.parts[*].text`,
//! - plain text.
//!
//! Everything downstream only ever sees the normalized string.

use serde::Deserialize;

use crate::error::GenerationError;

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Turn raw backend output into trimmed, non-empty text.
///
/// Returns `EmptyResponse` when the output (or the text it carries) is blank,
/// and `MalformedResponse` for JSON that is invalid or has neither shape.
pub fn normalize_response(raw: &str) -> Result<String, GenerationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    if !trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let response: RawResponse = serde_json::from_str(trimmed)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let had_text_field = response.text.is_some();

    match extract_text(response) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(_) => Err(GenerationError::EmptyResponse),
        None if had_text_field => Err(GenerationError::EmptyResponse),
        None => Err(GenerationError::MalformedResponse(
            "no text field and no candidate parts".to_string(),
        )),
    }
}

fn extract_text(response: RawResponse) -> Option<String> {
    if let Some(text) = response.text
        && !text.trim().is_empty()
    {
        return Some(text);
    }

    let candidate = response.candidates.into_iter().next()?;
    let parts = candidate.content?.parts;
    if parts.is_empty() {
        return None;
    }

    Some(parts.into_iter().filter_map(|p| p.text).collect())
}
