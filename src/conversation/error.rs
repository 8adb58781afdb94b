//! Conversation-level errors.
//!
//! Only [`ConversationError`] reaches the user-visible error slot.
//! Translation, capture and playback failures are absorbed where they
//! happen.

use thiserror::Error;

use super::transcript::MessageId;
use crate::llm::LlmError;

/// Errors promoted to the rendering surface's error slot.
#[derive(Debug, Clone, Error)]
pub enum ConversationError {
    /// The conversation service could not be established.  The session is
    /// unusable until recreated.
    #[error("Failed to initialize chat service. Please check your API key.")]
    Initialization(#[source] LlmError),

    /// A streamed reply failed.  The partial reply has been discarded.
    #[error("Failed to get a response: {0}")]
    Streaming(#[source] LlmError),
}

/// Why a submission was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("nothing to send")]
    Empty,

    #[error("a reply is still in progress")]
    Busy,

    #[error("the conversation service is unavailable")]
    Unavailable,

    #[error("the conversation has shut down")]
    Closed,
}

/// Why a playback toggle was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleError {
    #[error("speech playback is not supported")]
    Unsupported,

    #[error("message {0} does not exist")]
    UnknownMessage(MessageId),

    #[error("message {0} is not an assistant reply")]
    NotAssistant(MessageId),

    #[error("message {0} is still being written")]
    StillStreaming(MessageId),

    #[error("message {0} has no text")]
    EmptyMessage(MessageId),

    #[error("the conversation has shut down")]
    Closed,
}

/// The orchestrator is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the conversation has shut down")]
pub struct ConversationClosed;
