//! Response Streamer — incremental text generation for one conversation turn.
//!
//! [`ResponseStreamer`] is the seam the conversation orchestrator drives.
//! [`ApiStreamer`] implements it against any OpenAI-compatible
//! `/chat/completions` endpoint with `"stream": true`, decoding the
//! server-sent event body into reply fragments.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

use crate::config::{ChatConfig, LlmConfig};
use crate::conversation::Message;
use crate::llm::client::{ChatClient, LlmError};
use crate::llm::prompt::PromptBuilder;
use crate::llm::sse::{SseDecoder, SseEvent};

/// Reply fragments in delivery order.  Ends with `None` on normal
/// completion; an `Err` item is terminal.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

// ---------------------------------------------------------------------------
// ResponseStreamer trait
// ---------------------------------------------------------------------------

/// Opens a streamed reply for `text` given the conversation so far.
///
/// The returned stream is lazy: nothing is sent before it is first polled,
/// and dropping it abandons the exchange.
pub trait ResponseStreamer: Send + Sync {
    fn stream(&self, history: &[Message], text: &str) -> TextStream;
}

// ---------------------------------------------------------------------------
// ApiStreamer
// ---------------------------------------------------------------------------

/// Streams chat completions from an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ApiStreamer {
    client: ChatClient,
    model: String,
    temperature: f32,
    top_p: f32,
    prompt_builder: PromptBuilder,
}

impl ApiStreamer {
    /// Establish the conversation service.
    ///
    /// # Errors
    ///
    /// [`LlmError::Request`] when the base URL or model is missing, or the
    /// HTTP client cannot be built.
    pub fn from_config(llm: &LlmConfig, chat: &ChatConfig) -> Result<Self, LlmError> {
        if llm.chat_model.trim().is_empty() {
            return Err(LlmError::Request("no chat model configured".into()));
        }
        let client = ChatClient::new(llm, Duration::from_secs(llm.timeout_secs))?;

        Ok(Self {
            client,
            model: llm.chat_model.clone(),
            temperature: llm.temperature,
            top_p: llm.top_p,
            prompt_builder: PromptBuilder::new(chat.system_instruction.clone(), chat.history_limit),
        })
    }

    fn request_body(&self, history: &[Message], text: &str) -> Value {
        json!({
            "model":       self.model,
            "messages":    self.prompt_builder.conversation(history, text),
            "stream":      true,
            "temperature": self.temperature,
            "top_p":       self.top_p,
        })
    }
}

impl ResponseStreamer for ApiStreamer {
    fn stream(&self, history: &[Message], text: &str) -> TextStream {
        let state = StreamState::Connect {
            client: self.client.clone(),
            body: self.request_body(history, text),
        };
        stream::unfold(state, advance).boxed()
    }
}

// ---------------------------------------------------------------------------
// Stream state machine
// ---------------------------------------------------------------------------

enum StreamState {
    Connect { client: ChatClient, body: Value },
    Body(BodyState),
    Done,
}

struct BodyState {
    bytes: BoxStream<'static, Result<Vec<u8>, LlmError>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl BodyState {
    fn new(response: reqwest::Response) -> Self {
        let bytes = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| LlmError::Stream(e.to_string()))
            })
            .boxed();
        Self {
            bytes,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn absorb(&mut self, events: Vec<SseEvent>) -> Result<(), LlmError> {
        for event in events {
            match event {
                SseEvent::Done => self.finished = true,
                SseEvent::Data(payload) => {
                    if let Some(text) = delta_content(&payload)? {
                        self.pending.push_back(text);
                    }
                }
            }
        }
        Ok(())
    }
}

async fn advance(mut state: StreamState) -> Option<(Result<String, LlmError>, StreamState)> {
    loop {
        state = match state {
            StreamState::Done => return None,
            StreamState::Connect { client, body } => match client.post(&body).await {
                Ok(response) => StreamState::Body(BodyState::new(response)),
                Err(e) => return Some((Err(e), StreamState::Done)),
            },
            StreamState::Body(mut body) => {
                if let Some(text) = body.pending.pop_front() {
                    return Some((Ok(text), StreamState::Body(body)));
                }
                if body.finished {
                    return None;
                }
                match body.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let events = body.decoder.push(&chunk);
                        if let Err(e) = body.absorb(events) {
                            return Some((Err(e), StreamState::Done));
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), StreamState::Done)),
                    None => {
                        let events = body.decoder.finish();
                        if let Err(e) = body.absorb(events) {
                            return Some((Err(e), StreamState::Done));
                        }
                        body.finished = true;
                    }
                }
                StreamState::Body(body)
            }
        };
    }
}

/// Extract `choices[0].delta.content` from one streamed chunk.
///
/// Returns `Ok(None)` for chunks that carry no text (role announcements,
/// finish reasons).  An `error` object in the payload is a stream failure.
pub fn delta_content(payload: &str) -> Result<Option<String>, LlmError> {
    let json: Value = serde_json::from_str(payload).map_err(|e| LlmError::Parse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        let message = err["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(LlmError::Stream(message));
    }

    Ok(json["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
