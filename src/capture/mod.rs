//! Voice capture: speech recognition sessions feeding the conversation.
//!
//! # Architecture
//!
//! ```text
//! SpeechRecognizer (engine)          VoiceCaptureController
//!   start(options, sink) ──events──▶   next_event() / handle_event()
//!   stop() / abort()     ◀──────────     start() / stop() / Drop
//!                                            │
//!                                            ▼
//!                             CaptureUpdate::{Interim, Final, …}
//! ```
//!
//! The controller never talks to the conversation directly; its owner turns
//! `CaptureUpdate::Final` into a submission.

pub mod command;
pub mod controller;
pub mod recognizer;

pub use command::CommandRecognizer;
pub use controller::{partition_results, CaptureState, CaptureUpdate, VoiceCaptureController};
pub use recognizer::{
    CaptureError, RecognitionEvent, RecognitionOptions, RecognitionResult, SpeechRecognizer,
    UnsupportedRecognizer,
};
