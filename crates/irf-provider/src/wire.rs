//! Messages API payloads and status mapping

use std::time::Duration;

use irf_core::GenerationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) max_tokens: u32,
    pub(crate) system: &'a str,
    pub(crate) messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub(crate) content: Vec<ContentBlock>,
    #[serde(default)]
    pub(crate) stop_reason: Option<String>,
    #[serde(default)]
    pub(crate) usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    pub(crate) input_tokens: u64,
    pub(crate) output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl MessagesResponse {
    /// Concatenated text blocks; empty text is a provider failure
    pub(crate) fn into_text(self) -> Result<String, GenerationError> {
        let text: String = self
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        if text.trim().is_empty() {
            return Err(GenerationError::Provider(format!(
                "empty response (stop_reason: {})",
                self.stop_reason.as_deref().unwrap_or("none")
            )));
        }
        Ok(text)
    }
}

/// Seconds from a `retry-after` header; HTTP dates are ignored
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Map a non-success response onto a [`GenerationError`]
#[must_use]
pub fn classify_status(status: u16, retry_after: Option<&str>, body: &str) -> GenerationError {
    let message = error_message(body);
    match status {
        429 | 529 => GenerationError::RateLimited {
            retry_after: retry_after.and_then(parse_retry_after),
        },
        401 | 403 => GenerationError::Auth(message),
        _ => GenerationError::Provider(format!("HTTP {status}: {message}")),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}
