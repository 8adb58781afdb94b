//! Pronunciation Translator — phonetic rendering of reply text for playback.
//!
//! A speech voice for the reply language is rarely installed, so replies are
//! rendered into a script a commonly available voice can pronounce.  The
//! request is a single, non-streamed chat completion.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{LlmConfig, PronunciationConfig};
use crate::llm::client::{ChatClient, LlmError};
use crate::llm::prompt::pronunciation_prompt;

// ---------------------------------------------------------------------------
// PronunciationTranslator trait
// ---------------------------------------------------------------------------

/// Async, stateless text → pronunciation rendering.
///
/// Implementors must be `Send + Sync` so they can be held behind an
/// `Arc<dyn PronunciationTranslator>`.
#[async_trait]
pub trait PronunciationTranslator: Send + Sync {
    async fn render(&self, text: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiTranslator
// ---------------------------------------------------------------------------

/// Requests renderings from an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ApiTranslator {
    client: ChatClient,
    config: PronunciationConfig,
}

impl ApiTranslator {
    pub fn from_config(llm: &LlmConfig, config: &PronunciationConfig) -> Result<Self, LlmError> {
        let client = ChatClient::new(llm, Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": self.config.system_instruction },
                { "role": "user",   "content": pronunciation_prompt(text) }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
        })
    }
}

#[async_trait]
impl PronunciationTranslator for ApiTranslator {
    async fn render(&self, text: &str) -> Result<String, LlmError> {
        let response = self.client.post(&self.request_body(text)).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let rendered = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if rendered.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(rendered)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
