//! Transcript Store — the ordered message log of one conversation.
//!
//! The log is append-only with one exception: the *draft*, the single open
//! assistant message that is still receiving streamed text.  The draft is
//! tracked in an explicit slot and either closed (its text becomes
//! immutable) or discarded (removed from the log).  Pronunciation renderings
//! may be attached to any assistant message at any time.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// MessageId / Role / Message
// ---------------------------------------------------------------------------

/// Opaque message identity.  Assigned by [`Transcript`] in increasing order
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MessageId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    /// Phonetic rendering used for playback, when one has been produced.
    pub pronunciation: Option<String>,
}

// ---------------------------------------------------------------------------
// TranscriptError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranscriptError {
    #[error("an assistant message is already open")]
    DraftOpen,

    #[error("no assistant message is open")]
    NoDraft,

    #[error("message {0} does not exist")]
    UnknownMessage(MessageId),

    #[error("message {0} is not an assistant message")]
    NotAssistant(MessageId),
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    draft: Option<MessageId>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The open assistant message, if any.
    pub fn draft(&self) -> Option<MessageId> {
        self.draft
    }

    /// Messages that are no longer receiving text, in order.
    pub fn completed(&self) -> impl Iterator<Item = &Message> {
        let draft = self.draft;
        self.messages.iter().filter(move |m| Some(m.id) != draft)
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::User, text.into(), None)
    }

    /// Append a completed assistant message, e.g. a greeting.
    pub fn push_assistant(
        &mut self,
        text: impl Into<String>,
        pronunciation: Option<String>,
    ) -> MessageId {
        self.push(Role::Assistant, text.into(), pronunciation)
    }

    /// Append an empty assistant message that will receive streamed text.
    pub fn open_draft(&mut self) -> Result<MessageId, TranscriptError> {
        if self.draft.is_some() {
            return Err(TranscriptError::DraftOpen);
        }
        let id = self.push(Role::Assistant, String::new(), None);
        self.draft = Some(id);
        Ok(id)
    }

    /// Append a streamed fragment to the open message.
    pub fn append_to_draft(&mut self, chunk: &str) -> Result<&Message, TranscriptError> {
        let id = self.draft.ok_or(TranscriptError::NoDraft)?;
        let message = self.get_mut(id).ok_or(TranscriptError::UnknownMessage(id))?;
        message.text.push_str(chunk);
        Ok(message)
    }

    /// Promote the open message to a completed one.
    pub fn close_draft(&mut self) -> Option<&Message> {
        let id = self.draft.take()?;
        self.get(id)
    }

    /// Remove the open message from the log.
    pub fn discard_draft(&mut self) -> Option<Message> {
        let id = self.draft.take()?;
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    pub fn set_pronunciation(
        &mut self,
        id: MessageId,
        pronunciation: impl Into<String>,
    ) -> Result<(), TranscriptError> {
        let message = self.get_mut(id).ok_or(TranscriptError::UnknownMessage(id))?;
        if message.role != Role::Assistant {
            return Err(TranscriptError::NotAssistant(id));
        }
        message.pronunciation = Some(pronunciation.into());
        Ok(())
    }

    fn push(&mut self, role: Role, text: String, pronunciation: Option<String>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text,
            pronunciation,
        });
        id
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
