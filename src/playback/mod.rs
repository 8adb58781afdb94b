//! Voice playback: speech synthesis of assistant replies.
//!
//! This module provides:
//! * [`SpeechSynthesizer`] — engine seam, with [`UnsupportedSynthesizer`]
//!   and [`CommandSynthesizer`] (external program such as `espeak-ng`).
//! * [`VoicePlaybackController`] — the single live utterance, voice
//!   selection and start/cancel lifecycle.
//! * [`select_voice`] / [`VoiceCatalog`] — voice selection policy.

pub mod command;
pub mod controller;
pub mod synthesizer;
pub mod voice;

pub use command::CommandSynthesizer;
pub use controller::{PlaybackSignal, PlaybackUpdate, SpeechParams, VoicePlaybackController};
pub use synthesizer::{
    PlaybackError, SpeechSynthesizer, SynthesisEvent, UnsupportedSynthesizer, Utterance, Voice,
};
pub use voice::{select_voice, VoiceCatalog, VoicePolicy};
