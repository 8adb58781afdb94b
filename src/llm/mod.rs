//! Language-model adapters for the voice chat assistant.
//!
//! This module provides:
//! * [`ResponseStreamer`] / [`ApiStreamer`] — streamed conversation replies.
//! * [`PronunciationTranslator`] / [`ApiTranslator`] — phonetic rendering of
//!   replies for speech playback.
//! * [`PromptBuilder`] — system instructions and chat-message arrays.
//! * [`SseDecoder`] — incremental `text/event-stream` decoding.
//! * [`ChatClient`] / [`LlmError`] — shared HTTP plumbing and errors.
//!
//! Both adapters speak the OpenAI `/chat/completions` wire format, so any
//! compatible provider works (Gemini's OpenAI mode, OpenAI, Ollama, …).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use voice_chat::config::AppConfig;
//! use voice_chat::llm::{ApiStreamer, ResponseStreamer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let streamer = ApiStreamer::from_config(&config.llm, &config.chat).unwrap();
//!
//!     let mut reply = streamer.stream(&[], "Salaam");
//!     while let Some(chunk) = reply.next().await {
//!         print!("{}", chunk.unwrap());
//!     }
//! }
//! ```

pub mod client;
pub mod prompt;
pub mod sse;
pub mod streamer;
pub mod translator;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ChatClient, LlmError};
pub use prompt::PromptBuilder;
pub use sse::{SseDecoder, SseEvent};
pub use streamer::{ApiStreamer, ResponseStreamer, TextStream};
pub use translator::{ApiTranslator, PronunciationTranslator};
