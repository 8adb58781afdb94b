//! Speech-synthesis engine seam.
//!
//! [`SpeechSynthesizer`] abstracts one synthesis engine.  It speaks a single
//! [`Utterance`] at a time and reports progress on the event sink handed to
//! [`speak`](SpeechSynthesizer::speak).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors raised while starting an utterance.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// The host has no speech synthesis.
    #[error("speech synthesis is not supported on this host")]
    Unsupported,

    /// The engine refused or failed to start the utterance.
    #[error("speech synthesis engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Voice / Utterance / events
// ---------------------------------------------------------------------------

/// A voice offered by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-specific identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// BCP-47 locale, e.g. `"hi-IN"`.
    pub lang: String,
    /// Marked as the engine's default voice.
    #[serde(default)]
    pub default: bool,
}

impl Voice {
    pub fn new(id: impl Into<String>, lang: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            lang: lang.into(),
            default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Everything the engine needs to speak one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` lets the engine use its own default.
    pub voice: Option<Voice>,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

/// Notifications delivered by an engine for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    /// Audio output started.
    Started,
    /// The utterance finished naturally.
    Ended,
    /// The utterance failed.  No further events follow.
    Error(String),
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// One synthesis engine resource.
pub trait SpeechSynthesizer: Send {
    /// Whether the host can synthesize speech at all.
    fn is_supported(&self) -> bool;

    /// Voices currently installed.  May be empty until the engine has
    /// finished loading its voice list.
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking.  Events for this utterance go to `sink` only.
    fn speak(
        &mut self,
        utterance: Utterance,
        sink: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Result<(), PlaybackError>;

    /// Stop any in-progress utterance immediately.
    fn cancel(&mut self);

    /// Subscribe to voice-list changes.  Replaces any earlier subscription.
    fn watch_voices(&mut self, sink: mpsc::UnboundedSender<()>);

    /// Drop the voice-list subscription.
    fn unwatch_voices(&mut self);
}

// ---------------------------------------------------------------------------
// UnsupportedSynthesizer
// ---------------------------------------------------------------------------

/// Engine for hosts without speech synthesis.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSynthesizer;

impl SpeechSynthesizer for UnsupportedSynthesizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(
        &mut self,
        _utterance: Utterance,
        _sink: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Result<(), PlaybackError> {
        Err(PlaybackError::Unsupported)
    }

    fn cancel(&mut self) {}

    fn watch_voices(&mut self, _sink: mpsc::UnboundedSender<()>) {}

    fn unwatch_voices(&mut self) {}
}
