//! Speech-recognition engine seam.
//!
//! [`SpeechRecognizer`] abstracts a host recognition service that runs a
//! continuous session and reports progress through [`RecognitionEvent`]s.
//! The engine is handed a fresh event sink for every session.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::CaptureConfig;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while opening a recognition session.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The host has no speech recognition service.
    #[error("speech recognition is not supported on this host")]
    Unsupported,

    /// The engine refused to open a session.
    #[error("speech recognition engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Options / events
// ---------------------------------------------------------------------------

/// Session parameters handed to the engine on every start.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl From<&CaptureConfig> for RecognitionOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

/// Best alternative of one recognition segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Notifications delivered by an engine during one session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Audio capture has begun.
    Started,
    /// The result list changed; entries from `result_index` on are new or
    /// updated.
    Results {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    /// The session failed.  No further events follow.
    Error(String),
    /// The session is over, whether stopped, aborted or timed out.
    Ended,
}

// ---------------------------------------------------------------------------
// SpeechRecognizer trait
// ---------------------------------------------------------------------------

/// One recognition engine resource.
///
/// The engine must send every event of a session to the `sink` it was
/// started with and may drop the sink once the session is over.
pub trait SpeechRecognizer: Send {
    /// Whether the host can recognise speech at all.
    fn is_supported(&self) -> bool;

    /// Open a session.
    fn start(
        &mut self,
        options: &RecognitionOptions,
        sink: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), CaptureError>;

    /// Request graceful termination; pending audio is still recognised and
    /// `Ended` follows.
    fn stop(&mut self);

    /// Terminate immediately, discarding pending audio.
    fn abort(&mut self);
}

// ---------------------------------------------------------------------------
// UnsupportedRecognizer
// ---------------------------------------------------------------------------

/// Engine for hosts without speech recognition.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(
        &mut self,
        _options: &RecognitionOptions,
        _sink: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported)
    }

    fn stop(&mut self) {}

    fn abort(&mut self) {}
}
