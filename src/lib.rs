//! Voice chat assistant: a streamed language-model conversation with
//! optional voice input and spoken replies.
//!
//! * [`config`] — TOML settings and the config directory.
//! * [`llm`] — reply streaming and pronunciation rendering adapters.
//! * [`capture`] — speech-recognition sessions.
//! * [`playback`] — speech synthesis of replies.
//! * [`conversation`] — transcript, turn state and the orchestrator task.
//! * [`console`] — line-oriented rendering surface.

pub mod capture;
pub mod config;
pub mod console;
pub mod conversation;
pub mod llm;
pub mod playback;
