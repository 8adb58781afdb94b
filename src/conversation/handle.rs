//! Rendering-surface side of the orchestrator.
//!
//! A [`ConversationHandle`] is cheap to clone.  Every call is a [`Command`]
//! sent to the orchestrator task; calls that can be refused wait for the
//! verdict on a oneshot reply.

use tokio::sync::{mpsc, oneshot, watch};

use super::error::{ConversationClosed, SubmitError, ToggleError};
use super::state::ConversationView;
use super::transcript::MessageId;

/// Outcome of a successful playback toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackToggle {
    /// Playback of the message began (possibly after a pronunciation
    /// rendering is fetched).
    Started,
    /// The message was playing and has been stopped.
    Stopped,
}

/// Requests from the rendering surface.
#[derive(Debug)]
pub enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    TogglePlayback {
        message: MessageId,
        reply: oneshot::Sender<Result<PlaybackToggle, ToggleError>>,
    },
    StartCapture,
    StopCapture,
}

#[derive(Debug, Clone)]
pub struct ConversationHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ConversationView>,
}

impl ConversationHandle {
    pub fn new(commands: mpsc::Sender<Command>, view: watch::Receiver<ConversationView>) -> Self {
        Self { commands, view }
    }

    /// Send `text` as a user turn.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SubmitError> {
        let (reply, verdict) = oneshot::channel();
        let command = Command::Submit {
            text: text.into(),
            reply,
        };
        self.commands
            .send(command)
            .await
            .map_err(|_| SubmitError::Closed)?;
        verdict.await.map_err(|_| SubmitError::Closed)?
    }

    /// Start speaking `message`, or stop it if it is the one playing.
    pub async fn toggle_playback(&self, message: MessageId) -> Result<PlaybackToggle, ToggleError> {
        let (reply, verdict) = oneshot::channel();
        self.commands
            .send(Command::TogglePlayback { message, reply })
            .await
            .map_err(|_| ToggleError::Closed)?;
        verdict.await.map_err(|_| ToggleError::Closed)?
    }

    pub async fn start_capture(&self) -> Result<(), ConversationClosed> {
        self.commands
            .send(Command::StartCapture)
            .await
            .map_err(|_| ConversationClosed)
    }

    pub async fn stop_capture(&self) -> Result<(), ConversationClosed> {
        self.commands
            .send(Command::StopCapture)
            .await
            .map_err(|_| ConversationClosed)
    }

    /// Latest published view.
    pub fn view(&self) -> ConversationView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.view.clone()
    }
}
