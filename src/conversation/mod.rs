//! Conversation session: transcript, turn state and the orchestrator task.
//!
//! # Architecture
//!
//! ```text
//! rendering surface
//!   │  ConversationHandle::submit / toggle_playback / start_capture / stop_capture
//!   ▼
//! Orchestrator::run()  ← single tokio task
//!   ├─ Transcript            (messages, open draft, pronunciations)
//!   ├─ ResponseStreamer      (reply fragments)
//!   ├─ PronunciationTranslator
//!   ├─ VoiceCaptureController
//!   └─ VoicePlaybackController
//!   │
//!   ▼
//! watch::Receiver<ConversationView>  ← read by the rendering surface
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_chat::capture::UnsupportedRecognizer;
//! use voice_chat::config::AppConfig;
//! use voice_chat::conversation::{Orchestrator, Services};
//! use voice_chat::llm::{ApiStreamer, ApiTranslator, ResponseStreamer, PronunciationTranslator};
//! use voice_chat::playback::UnsupportedSynthesizer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let services = Services {
//!         streamer: ApiStreamer::from_config(&config.llm, &config.chat)
//!             .map(|s| Arc::new(s) as Arc<dyn ResponseStreamer>),
//!         translator: ApiTranslator::from_config(&config.llm, &config.pronunciation)
//!             .ok()
//!             .map(|t| Arc::new(t) as Arc<dyn PronunciationTranslator>),
//!         recognizer: Box::new(UnsupportedRecognizer),
//!         synthesizer: Box::new(UnsupportedSynthesizer),
//!     };
//!
//!     let (handle, _task) = Orchestrator::new(services, &config).spawn();
//!     handle.submit("Salaam").await.unwrap();
//! }
//! ```

pub mod error;
pub mod handle;
pub mod orchestrator;
pub mod state;
pub mod transcript;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use error::{ConversationClosed, ConversationError, SubmitError, ToggleError};
pub use handle::{Command, ConversationHandle, PlaybackToggle};
pub use orchestrator::{Orchestrator, Services};
pub use state::{Capabilities, ConversationView, TurnPhase};
pub use transcript::{Message, MessageId, Role, Transcript, TranscriptError};
