//! Conversation Orchestrator — drives the submit → stream → speak loop.
//!
//! [`Orchestrator`] owns the [`Transcript`], both voice controllers and the
//! language-model adapters.  It runs as a single tokio task and reacts to
//! whichever of its inputs is ready first:
//!
//! ```text
//!   ConversationHandle ──Command──┐
//!   TextStream fragments ─────────┤
//!   pronunciation rendering ──────┼──▶ Orchestrator::run() ──▶ watch<ConversationView>
//!   VoiceCaptureController ───────┤
//!   VoicePlaybackController ──────┘
//! ```
//!
//! # Turn flow
//!
//! ```text
//! submit(text)
//!   └─▶ cancel playback, append user message, open draft      [Streaming]
//!         ├─ fragment → append to draft
//!         ├─ Err      → discard draft, set error slot         [Idle]
//!         └─ end      → close draft
//!               ├─ no text / no playback                      [Idle]
//!               └─ render pronunciation                       [Translating]
//!                     ├─ Ok  → attach rendering, speak it     [Idle]
//!                     └─ Err → warn, speak original text      [Idle]
//! ```
//!
//! Everything runs on one task, so no state is shared and no locks are
//! taken.  Abandoning work (a superseded rendering, the reply stream on
//! shutdown) is done by dropping its future.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::capture::{CaptureUpdate, RecognitionEvent, RecognitionOptions, SpeechRecognizer, VoiceCaptureController};
use crate::config::AppConfig;
use crate::llm::{LlmError, PronunciationTranslator, ResponseStreamer, TextStream};
use crate::playback::{PlaybackSignal, PlaybackUpdate, SpeechSynthesizer, VoicePlaybackController};

use super::error::{ConversationError, SubmitError, ToggleError};
use super::handle::{Command, ConversationHandle, PlaybackToggle};
use super::state::{Capabilities, ConversationView, TurnPhase};
use super::transcript::{Message, MessageId, Role, Transcript};

/// Commands buffered between the rendering surface and the orchestrator.
const COMMAND_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// External capabilities the orchestrator is assembled from.
pub struct Services {
    /// The established conversation service, or why it could not be set up.
    pub streamer: Result<Arc<dyn ResponseStreamer>, LlmError>,
    /// `None` speaks replies as written.
    pub translator: Option<Arc<dyn PronunciationTranslator>>,
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
}

struct ActiveTurn {
    message: MessageId,
    stream: TextStream,
}

/// A pronunciation rendering in flight, to be spoken when it resolves.
struct PendingSpeech {
    message: MessageId,
    source: String,
    rendering: BoxFuture<'static, Result<String, LlmError>>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one conversation session.
///
/// Create with [`Orchestrator::new`], then either [`spawn`](Self::spawn) it
/// or call [`run`](Self::run) inside a task of your own.
///
/// ```rust,no_run
/// use voice_chat::capture::UnsupportedRecognizer;
/// use voice_chat::config::AppConfig;
/// use voice_chat::conversation::{Orchestrator, Services};
/// use voice_chat::llm::LlmError;
/// use voice_chat::playback::UnsupportedSynthesizer;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let services = Services {
///     streamer: Err(LlmError::Request("no API key".into())),
///     translator: None,
///     recognizer: Box::new(UnsupportedRecognizer),
///     synthesizer: Box::new(UnsupportedSynthesizer),
/// };
/// let (handle, _task) = Orchestrator::new(services, &config).spawn();
/// assert!(!handle.view().ready);
/// # }
/// ```
pub struct Orchestrator {
    transcript: Transcript,
    phase: TurnPhase,
    error: Option<String>,
    streamer: Option<Arc<dyn ResponseStreamer>>,
    translator: Option<Arc<dyn PronunciationTranslator>>,
    capture: VoiceCaptureController,
    playback: VoicePlaybackController,
    turn: Option<ActiveTurn>,
    pending: Option<PendingSpeech>,
    view: watch::Sender<ConversationView>,
    revision: u64,
}

impl Orchestrator {
    /// Assemble a session.  When the conversation service is available the
    /// transcript is seeded with the configured greeting; otherwise the
    /// initialization error is published and every submission is refused.
    pub fn new(services: Services, config: &AppConfig) -> Self {
        let mut transcript = Transcript::new();
        let (streamer, error) = match services.streamer {
            Ok(streamer) => {
                if let Some(greeting) = &config.chat.greeting {
                    transcript.push_assistant(greeting.text.clone(), greeting.pronunciation.clone());
                }
                (Some(streamer), None)
            }
            Err(e) => {
                log::error!("conversation: chat service unavailable: {e}");
                (None, Some(ConversationError::Initialization(e).to_string()))
            }
        };

        let translator = services
            .translator
            .filter(|_| config.pronunciation.enabled);
        let capture = VoiceCaptureController::new(
            services.recognizer,
            RecognitionOptions::from(&config.capture),
        );
        let playback = VoicePlaybackController::new(services.synthesizer, &config.playback);
        let (view, _) = watch::channel(ConversationView::default());

        let mut orchestrator = Self {
            transcript,
            phase: TurnPhase::Idle,
            error,
            streamer,
            translator,
            capture,
            playback,
            turn: None,
            pending: None,
            view,
            revision: 0,
        };
        orchestrator.publish();
        orchestrator
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.view.subscribe()
    }

    /// Run on a new tokio task.  The task ends once every handle is dropped.
    pub fn spawn(self) -> (ConversationHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = ConversationHandle::new(tx, self.subscribe());
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed, then tear the session down.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.publish();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                item = next_fragment(&mut self.turn) => self.handle_fragment(item),
                rendered = next_rendering(&mut self.pending) => self.handle_rendering(rendered),
                event = self.capture.next_event() => self.handle_capture(event),
                signal = self.playback.next_event() => self.handle_playback(signal),
            }
        }

        log::info!("conversation: command channel closed, shutting down");
        self.shutdown();
    }

    /// Abandon in-flight work.  The controllers abort capture and cancel
    /// playback when dropped.
    fn shutdown(mut self) {
        self.turn = None;
        self.pending = None;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Replies are sent after the resulting view is published, so a caller
    /// that saw its command accepted also sees its effect.
    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { text, reply } => {
                let result = self.submit(&text);
                if let Err(e) = &result {
                    log::debug!("conversation: submission refused: {e}");
                }
                self.publish();
                let _ = reply.send(result);
            }
            Command::TogglePlayback { message, reply } => {
                let result = self.toggle_playback(message);
                self.publish();
                let _ = reply.send(result);
            }
            Command::StartCapture => {
                self.capture.start();
                self.publish();
            }
            Command::StopCapture => {
                self.capture.stop();
                self.publish();
            }
        }
    }

    fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }
        let Some(streamer) = self.streamer.clone() else {
            return Err(SubmitError::Unavailable);
        };
        if self.phase.is_busy() {
            return Err(SubmitError::Busy);
        }

        // New turns take priority over any audio from earlier ones.
        self.stop_speech();

        let context: Vec<Message> = self.transcript.completed().cloned().collect();
        self.transcript.push_user(text);
        let message = self.transcript.open_draft().map_err(|e| {
            log::error!("conversation: cannot open reply: {e}");
            SubmitError::Busy
        })?;

        self.turn = Some(ActiveTurn {
            message,
            stream: streamer.stream(&context, text),
        });
        self.phase = TurnPhase::Streaming;
        self.error = None;
        log::info!("conversation: turn submitted, streaming reply {message}");
        Ok(())
    }

    fn toggle_playback(&mut self, id: MessageId) -> Result<PlaybackToggle, ToggleError> {
        if !self.playback.is_supported() {
            return Err(ToggleError::Unsupported);
        }
        let message = self
            .transcript
            .get(id)
            .ok_or(ToggleError::UnknownMessage(id))?;
        if message.role != Role::Assistant {
            return Err(ToggleError::NotAssistant(id));
        }
        if self.transcript.draft() == Some(id) {
            return Err(ToggleError::StillStreaming(id));
        }
        if message.text.is_empty() {
            return Err(ToggleError::EmptyMessage(id));
        }

        let playing = self.playback.speaking() == Some(id)
            || self.pending.as_ref().is_some_and(|p| p.message == id);
        self.stop_speech();
        if playing {
            log::debug!("conversation: playback of message {id} stopped");
            return Ok(PlaybackToggle::Stopped);
        }

        self.prepare_speech(id);
        Ok(PlaybackToggle::Started)
    }

    // -----------------------------------------------------------------------
    // Reply stream
    // -----------------------------------------------------------------------

    fn handle_fragment(&mut self, item: Option<Result<String, LlmError>>) {
        match item {
            Some(Ok(fragment)) => {
                if let Err(e) = self.transcript.append_to_draft(&fragment) {
                    log::warn!("conversation: fragment dropped: {e}");
                }
            }
            Some(Err(e)) => self.fail_turn(e),
            None => self.complete_turn(),
        }
        self.publish();
    }

    fn fail_turn(&mut self, e: LlmError) {
        self.turn = None;
        if let Some(partial) = self.transcript.discard_draft() {
            log::debug!(
                "conversation: discarded partial reply {} ({} bytes)",
                partial.id,
                partial.text.len()
            );
        }
        let error = ConversationError::Streaming(e);
        log::error!("conversation: {error}");
        self.error = Some(error.to_string());
        self.phase = TurnPhase::Idle;
    }

    fn complete_turn(&mut self) {
        let Some(turn) = self.turn.take() else {
            return;
        };
        self.phase = TurnPhase::Idle;
        let Some(reply) = self.transcript.close_draft() else {
            return;
        };
        let has_text = !reply.text.is_empty();
        log::info!(
            "conversation: reply {} complete ({} bytes)",
            turn.message,
            reply.text.len()
        );

        if has_text && self.playback.is_supported() {
            self.prepare_speech(turn.message);
            if self.pending.is_some() {
                self.phase = TurnPhase::Translating;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Speech
    // -----------------------------------------------------------------------

    /// Speak `id`, using its stored rendering when there is one and
    /// requesting one otherwise.
    fn prepare_speech(&mut self, id: MessageId) {
        let Some(message) = self.transcript.get(id) else {
            return;
        };
        if let Some(rendering) = message.pronunciation.clone() {
            self.speak(id, &rendering);
            return;
        }

        let source = message.text.clone();
        match self.translator.clone() {
            Some(translator) => {
                let text = source.clone();
                log::debug!("conversation: requesting pronunciation for message {id}");
                self.pending = Some(PendingSpeech {
                    message: id,
                    source,
                    rendering: async move { translator.render(&text).await }.boxed(),
                });
            }
            None => self.speak(id, &source),
        }
    }

    fn handle_rendering(&mut self, result: Result<String, LlmError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let id = pending.message;
        match result {
            Ok(rendering) => {
                if let Err(e) = self.transcript.set_pronunciation(id, rendering.clone()) {
                    log::warn!("conversation: rendering not stored: {e}");
                }
                self.speak(id, &rendering);
            }
            Err(e) => {
                log::warn!(
                    "conversation: pronunciation failed for message {id}, speaking original text: {e}"
                );
                self.speak(id, &pending.source);
            }
        }
        if self.phase == TurnPhase::Translating {
            self.phase = TurnPhase::Idle;
        }
        self.publish();
    }

    fn speak(&mut self, id: MessageId, text: &str) {
        if self.playback.is_live() {
            self.playback.cancel();
        }
        if !self.playback.speak(id, text) {
            log::warn!("conversation: playback of message {id} did not start");
        }
    }

    /// Cancel live playback and abandon any rendering still in flight.
    fn stop_speech(&mut self) {
        if self.playback.is_live() {
            self.playback.cancel();
        }
        if let Some(pending) = self.pending.take() {
            log::debug!("conversation: abandoned rendering for message {}", pending.message);
        }
        if self.phase == TurnPhase::Translating {
            self.phase = TurnPhase::Idle;
        }
    }

    fn handle_playback(&mut self, signal: PlaybackSignal) {
        let Some(update) = self.playback.handle_event(signal) else {
            return;
        };
        match update {
            PlaybackUpdate::Started(id) => log::debug!("conversation: speaking message {id}"),
            PlaybackUpdate::Finished(id) => log::debug!("conversation: finished message {id}"),
            PlaybackUpdate::Failed(id, _) => log::debug!("conversation: playback of {id} failed"),
        }
        self.publish();
    }

    // -----------------------------------------------------------------------
    // Voice capture
    // -----------------------------------------------------------------------

    fn handle_capture(&mut self, event: RecognitionEvent) {
        let Some(update) = self.capture.handle_event(event) else {
            return;
        };
        match update {
            CaptureUpdate::Final(text) => match self.submit(&text) {
                Ok(()) => log::info!("conversation: voice input submitted"),
                Err(e) => log::warn!("conversation: voice input dropped: {e}"),
            },
            CaptureUpdate::Failed(e) => log::warn!("conversation: voice capture failed: {e}"),
            CaptureUpdate::Started | CaptureUpdate::Interim(_) | CaptureUpdate::Ended => {}
        }
        self.publish();
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    fn publish(&mut self) {
        self.revision += 1;
        let view = ConversationView {
            revision: self.revision,
            messages: self.transcript.messages().to_vec(),
            draft: self.transcript.draft(),
            phase: self.phase,
            speaking: self.playback.speaking(),
            preparing: self.pending.as_ref().map(|p| p.message),
            error: self.error.clone(),
            ready: self.streamer.is_some(),
            interim: self.capture.interim().to_string(),
            capturing: self.capture.is_active(),
            capabilities: Capabilities {
                capture: self.capture.is_supported(),
                playback: self.playback.is_supported(),
            },
        };
        self.view.send_replace(view);
    }
}

async fn next_fragment(turn: &mut Option<ActiveTurn>) -> Option<Result<String, LlmError>> {
    match turn.as_mut() {
        Some(turn) => turn.stream.next().await,
        None => std::future::pending().await,
    }
}

async fn next_rendering(pending: &mut Option<PendingSpeech>) -> Result<String, LlmError> {
    match pending.as_mut() {
        Some(pending) => pending.rendering.as_mut().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::capture::{CaptureError, RecognitionResult};
    use crate::playback::{PlaybackError, SynthesisEvent, UnsupportedSynthesizer, Utterance, Voice};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Recorder {
        spoken: Vec<String>,
        cancels: usize,
        capture_stops: usize,
        capture_sink: Option<mpsc::UnboundedSender<RecognitionEvent>>,
    }

    type Shared = Arc<Mutex<Recorder>>;

    /// Fragments are fed by calling `handle_fragment` directly.
    struct IdleStreamer;

    impl ResponseStreamer for IdleStreamer {
        fn stream(&self, _history: &[Message], _text: &str) -> TextStream {
            stream::pending().boxed()
        }
    }

    struct NeverTranslator;

    #[async_trait]
    impl PronunciationTranslator for NeverTranslator {
        async fn render(&self, _text: &str) -> Result<String, LlmError> {
            std::future::pending().await
        }
    }

    struct FakeRecognizer(Shared);

    impl SpeechRecognizer for FakeRecognizer {
        fn is_supported(&self) -> bool {
            true
        }
        fn start(
            &mut self,
            _options: &RecognitionOptions,
            sink: mpsc::UnboundedSender<RecognitionEvent>,
        ) -> Result<(), CaptureError> {
            self.0.lock().unwrap().capture_sink = Some(sink);
            Ok(())
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().capture_stops += 1;
        }
        fn abort(&mut self) {}
    }

    struct FakeSynth(Shared);

    impl SpeechSynthesizer for FakeSynth {
        fn is_supported(&self) -> bool {
            true
        }
        fn voices(&self) -> Vec<Voice> {
            Vec::new()
        }
        fn speak(
            &mut self,
            utterance: Utterance,
            _sink: mpsc::UnboundedSender<SynthesisEvent>,
        ) -> Result<(), PlaybackError> {
            self.0.lock().unwrap().spoken.push(utterance.text);
            Ok(())
        }
        fn cancel(&mut self) {
            self.0.lock().unwrap().cancels += 1;
        }
        fn watch_voices(&mut self, _sink: mpsc::UnboundedSender<()>) {}
        fn unwatch_voices(&mut self) {}
    }

    fn services(shared: &Shared) -> Services {
        Services {
            streamer: Ok(Arc::new(IdleStreamer)),
            translator: Some(Arc::new(NeverTranslator)),
            recognizer: Box::new(FakeRecognizer(Arc::clone(shared))),
            synthesizer: Box::new(FakeSynth(Arc::clone(shared))),
        }
    }

    fn orchestrator() -> (Orchestrator, Shared) {
        let shared = Shared::default();
        let o = Orchestrator::new(services(&shared), &AppConfig::default());
        (o, shared)
    }

    fn fragment(text: &str) -> Option<Result<String, LlmError>> {
        Some(Ok(text.to_string()))
    }

    /// Submit `q` and stream `reply` to completion.  Returns the reply id.
    fn complete_turn_with(o: &mut Orchestrator, q: &str, reply: &[&str]) -> MessageId {
        o.submit(q).unwrap();
        let id = o.transcript.draft().unwrap();
        for chunk in reply {
            o.handle_fragment(fragment(chunk));
        }
        o.handle_fragment(None);
        id
    }

    fn greeting_id(o: &Orchestrator) -> MessageId {
        o.transcript.messages()[0].id
    }

    fn view(o: &Orchestrator) -> ConversationView {
        o.subscribe().borrow().clone()
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    #[test]
    fn greeting_is_seeded_when_service_is_ready() {
        let (o, _) = orchestrator();
        let v = view(&o);
        assert!(v.ready);
        assert_eq!(v.messages.len(), 1);
        assert_eq!(v.messages[0].role, Role::Assistant);
        assert!(v.messages[0].pronunciation.is_some());
        assert_eq!(v.error, None);
    }

    #[test]
    fn initialization_failure_refuses_submissions() {
        let shared = Shared::default();
        let mut s = services(&shared);
        s.streamer = Err(LlmError::Request("no API key".into()));
        let mut o = Orchestrator::new(s, &AppConfig::default());

        let v = view(&o);
        assert!(!v.ready);
        assert!(v.messages.is_empty());
        assert_eq!(
            v.error.as_deref(),
            Some("Failed to initialize chat service. Please check your API key.")
        );
        assert_eq!(o.submit("hi"), Err(SubmitError::Unavailable));
        assert!(o.transcript.is_empty());
    }

    #[test]
    fn capabilities_reflect_engines() {
        let shared = Shared::default();
        let mut s = services(&shared);
        s.synthesizer = Box::new(UnsupportedSynthesizer);
        let o = Orchestrator::new(s, &AppConfig::default());
        let caps = view(&o).capabilities;
        assert!(caps.capture);
        assert!(!caps.playback);
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    #[test]
    fn blank_submission_is_rejected() {
        let (mut o, _) = orchestrator();
        assert_eq!(o.submit("   "), Err(SubmitError::Empty));
        assert_eq!(o.transcript.len(), 1);
    }

    #[test]
    fn submission_while_busy_is_rejected_without_change() {
        let (mut o, _) = orchestrator();
        o.submit("first").unwrap();
        let len = o.transcript.len();
        assert_eq!(o.submit("second"), Err(SubmitError::Busy));
        assert_eq!(o.transcript.len(), len);
        assert_eq!(o.phase, TurnPhase::Streaming);
    }

    #[test]
    fn submission_appends_user_message_then_draft() {
        let (mut o, _) = orchestrator();
        let (reply, mut verdict) = oneshot::channel();
        o.handle_command(Command::Submit {
            text: "  salaam  ".into(),
            reply,
        });
        assert_eq!(verdict.try_recv(), Ok(Ok(())));
        let msgs = o.transcript.messages();
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].text, "salaam");
        assert_eq!(msgs[2].role, Role::Assistant);
        assert_eq!(o.transcript.draft(), Some(msgs[2].id));
        assert!(view(&o).is_busy());
    }

    #[test]
    fn fragments_accumulate_in_arrival_order() {
        let (mut o, _) = orchestrator();
        let id = complete_turn_with(&mut o, "q", &["Hi", " there", "!"]);
        assert_eq!(o.transcript.get(id).unwrap().text, "Hi there!");
        assert_eq!(o.transcript.draft(), None);
    }

    #[test]
    fn stream_failure_discards_partial_reply() {
        let (mut o, _) = orchestrator();
        o.submit("X").unwrap();
        o.handle_fragment(fragment("partial"));
        o.handle_fragment(Some(Err(LlmError::Timeout)));

        let v = view(&o);
        assert_eq!(v.messages.len(), 2);
        assert_eq!(v.last().unwrap().role, Role::User);
        assert_eq!(v.draft, None);
        assert!(!v.is_busy());
        assert_eq!(v.error.as_deref(), Some("Failed to get a response: LLM request timed out"));

        // The next submission clears the error.
        o.submit("again").unwrap();
        assert_eq!(o.error, None);
    }

    #[test]
    fn empty_reply_skips_speech() {
        let (mut o, shared) = orchestrator();
        complete_turn_with(&mut o, "q", &[]);
        assert_eq!(o.phase, TurnPhase::Idle);
        assert!(o.pending.is_none());
        assert!(shared.lock().unwrap().spoken.is_empty());
    }

    #[test]
    fn whitespace_reply_is_still_spoken() {
        let shared = Shared::default();
        let mut config = AppConfig::default();
        config.pronunciation.enabled = false;
        let mut o = Orchestrator::new(services(&shared), &config);

        let id = complete_turn_with(&mut o, "q", &["\n"]);
        assert_eq!(shared.lock().unwrap().spoken, vec!["\n".to_string()]);
        assert_eq!(o.playback.speaking(), Some(id));
    }

    // -----------------------------------------------------------------------
    // Post-response pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn completed_reply_stays_busy_while_translating() {
        let (mut o, _) = orchestrator();
        let id = complete_turn_with(&mut o, "q", &["jawab"]);
        let v = view(&o);
        assert_eq!(v.phase, TurnPhase::Translating);
        assert_eq!(v.preparing, Some(id));
        assert_eq!(o.submit("next"), Err(SubmitError::Busy));
    }

    #[test]
    fn rendering_is_attached_and_spoken() {
        let (mut o, shared) = orchestrator();
        let id = complete_turn_with(&mut o, "q", &["jawab"]);
        o.handle_rendering(Ok("जवाब".into()));

        assert_eq!(shared.lock().unwrap().spoken, vec!["जवाब".to_string()]);
        assert_eq!(o.transcript.get(id).unwrap().pronunciation.as_deref(), Some("जवाब"));
        let v = view(&o);
        assert_eq!(v.phase, TurnPhase::Idle);
        assert_eq!(v.speaking, Some(id));
        assert_eq!(v.preparing, None);
    }

    #[test]
    fn rendering_failure_speaks_original_text_once() {
        let (mut o, shared) = orchestrator();
        let id = complete_turn_with(&mut o, "q", &["Hi", " there", "!"]);
        o.handle_rendering(Err(LlmError::EmptyResponse));

        assert_eq!(shared.lock().unwrap().spoken, vec!["Hi there!".to_string()]);
        assert_eq!(o.transcript.get(id).unwrap().pronunciation, None);
        assert_eq!(o.phase, TurnPhase::Idle);
    }

    #[test]
    fn disabled_translator_speaks_reply_directly() {
        let shared = Shared::default();
        let mut config = AppConfig::default();
        config.pronunciation.enabled = false;
        let mut o = Orchestrator::new(services(&shared), &config);

        complete_turn_with(&mut o, "q", &["jawab"]);
        assert_eq!(o.phase, TurnPhase::Idle);
        assert_eq!(shared.lock().unwrap().spoken, vec!["jawab".to_string()]);
    }

    #[test]
    fn new_submission_cancels_playback() {
        let (mut o, shared) = orchestrator();
        let greeting = greeting_id(&o);
        o.toggle_playback(greeting).unwrap();
        assert_eq!(o.playback.speaking(), Some(greeting));

        o.submit("q").unwrap();
        assert_eq!(shared.lock().unwrap().cancels, 1);
        assert_eq!(o.playback.speaking(), None);
    }

    // -----------------------------------------------------------------------
    // Playback toggle
    // -----------------------------------------------------------------------

    #[test]
    fn greeting_plays_its_preset_rendering() {
        let (mut o, shared) = orchestrator();
        let greeting = greeting_id(&o);
        let preset = o.transcript.get(greeting).unwrap().pronunciation.clone().unwrap();

        assert_eq!(o.toggle_playback(greeting), Ok(PlaybackToggle::Started));
        assert!(o.pending.is_none());
        assert_eq!(shared.lock().unwrap().spoken, vec![preset]);
    }

    #[test]
    fn toggle_twice_stops() {
        let (mut o, _) = orchestrator();
        let greeting = greeting_id(&o);
        o.toggle_playback(greeting).unwrap();
        assert_eq!(o.toggle_playback(greeting), Ok(PlaybackToggle::Stopped));
        assert_eq!(o.playback.speaking(), None);
    }

    #[test]
    fn toggle_during_translation_abandons_it() {
        let (mut o, shared) = orchestrator();
        let id = complete_turn_with(&mut o, "q", &["jawab"]);
        assert_eq!(o.toggle_playback(id), Ok(PlaybackToggle::Stopped));
        assert_eq!(o.phase, TurnPhase::Idle);
        assert!(o.pending.is_none());
        assert!(shared.lock().unwrap().spoken.is_empty());
    }

    #[test]
    fn toggling_another_message_switches_playback() {
        let (mut o, shared) = orchestrator();
        let reply = complete_turn_with(&mut o, "q", &["jawab"]);
        o.handle_rendering(Ok("जवाब".into()));

        let greeting = greeting_id(&o);
        assert_eq!(o.toggle_playback(greeting), Ok(PlaybackToggle::Started));
        assert_eq!(o.playback.speaking(), Some(greeting));
        assert_ne!(o.playback.speaking(), Some(reply));
        assert_eq!(shared.lock().unwrap().cancels, 1);
    }

    #[test]
    fn toggle_refusals() {
        let (mut o, _) = orchestrator();
        o.submit("q").unwrap();
        let user = o.transcript.messages()[1].id;
        let draft = o.transcript.draft().unwrap();
        let unknown: MessageId = "999".parse().unwrap();

        assert_eq!(o.toggle_playback(user), Err(ToggleError::NotAssistant(user)));
        assert_eq!(o.toggle_playback(draft), Err(ToggleError::StillStreaming(draft)));
        assert_eq!(o.toggle_playback(unknown), Err(ToggleError::UnknownMessage(unknown)));
    }

    #[test]
    fn toggle_without_playback_support() {
        let shared = Shared::default();
        let mut s = services(&shared);
        s.synthesizer = Box::new(UnsupportedSynthesizer);
        let mut o = Orchestrator::new(s, &AppConfig::default());
        let greeting = greeting_id(&o);
        assert_eq!(o.toggle_playback(greeting), Err(ToggleError::Unsupported));
    }

    // -----------------------------------------------------------------------
    // Voice capture
    // -----------------------------------------------------------------------

    fn final_result(text: &str) -> RecognitionEvent {
        RecognitionEvent::Results {
            result_index: 0,
            results: vec![RecognitionResult::finalized(text)],
        }
    }

    #[test]
    fn final_transcript_is_submitted_and_capture_stops() {
        let (mut o, shared) = orchestrator();
        o.handle_command(Command::StartCapture);
        assert!(view(&o).capturing);

        o.handle_capture(RecognitionEvent::Started);
        o.handle_capture(RecognitionEvent::Results {
            result_index: 0,
            results: vec![RecognitionResult::interim("sal")],
        });
        assert_eq!(view(&o).interim, "sal");

        o.handle_capture(final_result("salaam"));
        assert_eq!(o.transcript.messages()[1].text, "salaam");
        assert_eq!(o.phase, TurnPhase::Streaming);
        assert_eq!(shared.lock().unwrap().capture_stops, 1);

        // Late results from the stopping session are ignored.
        o.handle_capture(final_result("salaam"));
        assert_eq!(o.transcript.len(), 3);
    }

    #[test]
    fn voice_input_while_busy_is_dropped() {
        let (mut o, _) = orchestrator();
        o.submit("typed").unwrap();
        o.handle_command(Command::StartCapture);
        o.handle_capture(final_result("spoken"));
        assert_eq!(o.transcript.len(), 3);
        assert_eq!(o.transcript.messages()[1].text, "typed");
    }

    #[test]
    fn capture_error_does_not_touch_error_slot() {
        let (mut o, _) = orchestrator();
        o.handle_command(Command::StartCapture);
        o.handle_capture(RecognitionEvent::Error("not-allowed".into()));
        let v = view(&o);
        assert!(!v.capturing);
        assert_eq!(v.error, None);
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn run_ends_when_handles_are_dropped() {
        let (o, shared) = orchestrator();
        let (handle, task) = o.spawn();
        handle.start_capture().await.unwrap();
        drop(handle);
        task.await.unwrap();
        // The capture session was aborted on teardown, so its sink is closed.
        let sink = shared.lock().unwrap().capture_sink.take().unwrap();
        assert!(sink.is_closed());
    }
}
