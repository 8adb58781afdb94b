//! Voice Capture Controller — one recognition session at a time.
//!
//! [`VoiceCaptureController`] owns a [`SpeechRecognizer`] and the state of
//! the live capture session.  Capture is single-shot: the first non-empty
//! final transcript is reported once and the session stops itself.
//!
//! # Session lifecycle
//!
//! ```text
//! Idle ──start()──▶ Starting ──Started──▶ Listening
//!                      │                     │
//!                      │ stop() / final      │ stop() / final
//!                      ▼                     ▼
//!                   Stopping ◀───────────────┘
//!
//! any live state ──Ended / Error──▶ Idle   (interim text cleared)
//! ```
//!
//! Each session gets its own event channel.  The receiver is dropped when
//! the session ends, so a late event from a finished session can never be
//! mistaken for one from the next.

use tokio::sync::mpsc;

use super::recognizer::{RecognitionEvent, RecognitionOptions, RecognitionResult, SpeechRecognizer};

// ---------------------------------------------------------------------------
// CaptureState / CaptureUpdate
// ---------------------------------------------------------------------------

/// Phase of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No session.
    #[default]
    Idle,
    /// `start` was issued; the engine has not confirmed yet.
    Starting,
    /// The engine is listening.
    Listening,
    /// Termination requested; waiting for the engine to end the session.
    Stopping,
}

/// What the owner of the controller needs to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureUpdate {
    /// The engine confirmed the session.
    Started,
    /// Provisional text changed.
    Interim(String),
    /// A finalized utterance; the session is already stopping.
    Final(String),
    /// The session ended normally.
    Ended,
    /// The session ended with an error.
    Failed(String),
}

// ---------------------------------------------------------------------------
// VoiceCaptureController
// ---------------------------------------------------------------------------

pub struct VoiceCaptureController {
    engine: Box<dyn SpeechRecognizer>,
    options: RecognitionOptions,
    state: CaptureState,
    interim: String,
    final_delivered: bool,
    events: Option<mpsc::UnboundedReceiver<RecognitionEvent>>,
}

impl VoiceCaptureController {
    pub fn new(engine: Box<dyn SpeechRecognizer>, options: RecognitionOptions) -> Self {
        Self {
            engine,
            options,
            state: CaptureState::Idle,
            interim: String::new(),
            final_delivered: false,
            events: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.engine.is_supported()
    }

    /// `true` while a session is live, from `start` until the engine ends it.
    pub fn is_active(&self) -> bool {
        self.state != CaptureState::Idle
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Provisional transcript of the live session.
    pub fn interim(&self) -> &str {
        &self.interim
    }

    /// Open a session.  Returns `false` (and does nothing) when a session is
    /// already live, capture is unsupported, or the engine refuses.
    pub fn start(&mut self) -> bool {
        if self.is_active() || !self.is_supported() {
            log::debug!("capture: start ignored (state={:?})", self.state);
            return false;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = self.engine.start(&self.options, tx) {
            log::warn!("capture: could not start recognition: {e}");
            return false;
        }

        log::debug!("capture: session starting ({})", self.options.language);
        self.state = CaptureState::Starting;
        self.interim.clear();
        self.final_delivered = false;
        self.events = Some(rx);
        true
    }

    /// Ask the engine to end the session gracefully.
    pub fn stop(&mut self) {
        if matches!(self.state, CaptureState::Starting | CaptureState::Listening) {
            log::debug!("capture: stop requested");
            self.engine.stop();
            self.state = CaptureState::Stopping;
        }
    }

    /// Wait for the next engine event of the live session.
    ///
    /// Pends forever while no session is live, which makes it safe to poll
    /// unconditionally inside a `select!`.  A dropped engine sink is reported
    /// as [`RecognitionEvent::Ended`].
    pub async fn next_event(&mut self) -> RecognitionEvent {
        match self.events.as_mut() {
            Some(rx) => rx.recv().await.unwrap_or(RecognitionEvent::Ended),
            None => std::future::pending().await,
        }
    }

    /// Apply one engine event to the session.
    pub fn handle_event(&mut self, event: RecognitionEvent) -> Option<CaptureUpdate> {
        if self.state == CaptureState::Idle {
            return None;
        }

        match event {
            RecognitionEvent::Started => {
                if self.state == CaptureState::Starting {
                    self.state = CaptureState::Listening;
                }
                self.interim.clear();
                Some(CaptureUpdate::Started)
            }
            RecognitionEvent::Results {
                result_index,
                results,
            } => {
                if self.final_delivered {
                    return None;
                }
                let (interim, finalized) = partition_results(result_index, &results);
                self.interim = interim;

                let finalized = finalized.trim();
                if finalized.is_empty() {
                    return Some(CaptureUpdate::Interim(self.interim.clone()));
                }

                self.final_delivered = true;
                if self.state != CaptureState::Stopping {
                    self.engine.stop();
                    self.state = CaptureState::Stopping;
                }
                Some(CaptureUpdate::Final(finalized.to_string()))
            }
            RecognitionEvent::Error(message) => {
                log::warn!("capture: recognition error: {message}");
                self.end_session();
                Some(CaptureUpdate::Failed(message))
            }
            RecognitionEvent::Ended => {
                log::debug!("capture: session ended");
                self.end_session();
                Some(CaptureUpdate::Ended)
            }
        }
    }

    fn end_session(&mut self) {
        self.state = CaptureState::Idle;
        self.interim.clear();
        self.events = None;
    }
}

impl Drop for VoiceCaptureController {
    fn drop(&mut self) {
        if self.is_active() {
            log::debug!("capture: aborting live session on teardown");
            self.engine.abort();
        }
    }
}

/// Split the results from `result_index` on into `(interim, final)` text.
///
/// Both parts are plain concatenations in result order.
pub fn partition_results(result_index: usize, results: &[RecognitionResult]) -> (String, String) {
    let mut interim = String::new();
    let mut finalized = String::new();
    for result in results.iter().skip(result_index) {
        if result.is_final {
            finalized.push_str(&result.transcript);
        } else {
            interim.push_str(&result.transcript);
        }
    }
    (interim, finalized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
