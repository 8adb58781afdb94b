//! Shared HTTP plumbing for the OpenAI-compatible `/chat/completions`
//! endpoint, plus the [`LlmError`] type used by every LLM adapter.
//!
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use std::time::Duration;

use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the language model.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("LLM endpoint returned {code}: {body}")]
    Status { code: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// The connection broke after a streamed reply had started.
    #[error("response stream interrupted: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// A `reqwest::Client` bound to one chat-completions endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("url", &self.url)
            .field("authenticated", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Build a client for `config.base_url`.
    ///
    /// `timeout` bounds connection setup and response headers only, so a long
    /// streamed reply is not cut off half-way.
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self, LlmError> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(LlmError::Request("no API base URL configured".into()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        Ok(Self {
            http,
            url: format!("{base}/chat/completions"),
            api_key,
        })
    }

    /// The full `/chat/completions` URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether requests carry an `Authorization` header.
    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST `body` and return the response once its status is known to be a
    /// success.
    ///
    /// The `Authorization: Bearer …` header is attached only when a non-empty
    /// API key is configured.
    pub async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, LlmError> {
        let mut req = self.http.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body: truncate(&body, 200),
            });
        }
        Ok(response)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
