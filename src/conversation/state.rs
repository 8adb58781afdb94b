//! Turn state machine and the published conversation view.
//!
//! [`TurnPhase`] drives the orchestrator's state machine.  The rendering
//! surface reads [`ConversationView`] snapshots from a `watch` channel.

use super::transcript::{Message, MessageId};

// ---------------------------------------------------------------------------
// TurnPhase
// ---------------------------------------------------------------------------

/// Phase of the current conversation turn.
///
/// ```text
/// Idle ──submit──▶ Streaming ──complete, text, playback──▶ Translating ──▶ Idle
///                     │       ──complete, otherwise──────────────────────▶ Idle
///                     └──────failed (draft discarded)────────────────────▶ Idle
/// ```
///
/// Speaking is not a phase: once `speak` has been invoked the turn is over,
/// and a new submission simply cancels the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    /// Ready for a submission.
    #[default]
    Idle,
    /// Reply fragments are arriving.
    Streaming,
    /// The reply is complete; its pronunciation rendering is on the way.
    Translating,
}

impl TurnPhase {
    /// Returns `true` while a submission would be rejected.
    ///
    /// ```
    /// use voice_chat::conversation::TurnPhase;
    ///
    /// assert!(!TurnPhase::Idle.is_busy());
    /// assert!(TurnPhase::Streaming.is_busy());
    /// assert!(TurnPhase::Translating.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, TurnPhase::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "Idle",
            TurnPhase::Streaming => "Thinking",
            TurnPhase::Translating => "Preparing audio",
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationView
// ---------------------------------------------------------------------------

/// Which voice channels the host supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub capture: bool,
    pub playback: bool,
}

/// Everything the rendering surface needs, republished after every change.
#[derive(Debug, Clone, Default)]
pub struct ConversationView {
    /// Increments with every publication.
    pub revision: u64,
    /// Full ordered transcript.
    pub messages: Vec<Message>,
    /// The assistant message still receiving text.
    pub draft: Option<MessageId>,
    pub phase: TurnPhase,
    /// Message being spoken.
    pub speaking: Option<MessageId>,
    /// Message whose pronunciation rendering is being fetched for playback.
    pub preparing: Option<MessageId>,
    /// Last user-visible error.
    pub error: Option<String>,
    /// `false` when the conversation service could not be established.
    pub ready: bool,
    /// Provisional voice input for the input field.
    pub interim: String,
    /// A capture session is live.
    pub capturing: bool,
    pub capabilities: Capabilities,
}

impl ConversationView {
    /// The busy/loading flag for the current turn.
    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
