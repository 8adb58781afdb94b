//! Voice Playback Controller — one utterance at a time.
//!
//! [`VoicePlaybackController`] owns a [`SpeechSynthesizer`], the voice
//! selection policy and the live Playback Session.  It never queues or
//! overlaps utterances: `speak` while an utterance is live is refused, and
//! the caller interrupts with [`cancel`](VoicePlaybackController::cancel)
//! first.
//!
//! Every utterance gets its own event channel.  `cancel` drops the receiver
//! on the spot, so the cancelled utterance's late `Ended` can never clear a
//! newer one.

use tokio::sync::mpsc;

use crate::config::PlaybackConfig;
use crate::conversation::MessageId;

use super::synthesizer::{SpeechSynthesizer, SynthesisEvent, Utterance};
use super::voice::{select_voice, VoiceCatalog, VoicePolicy};

/// Signals the controller waits on.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSignal {
    /// An event for the live utterance.
    Synthesis(SynthesisEvent),
    /// The engine's voice list changed.
    VoicesChanged,
}

/// What the owner of the controller needs to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    Started(MessageId),
    /// The utterance finished naturally.
    Finished(MessageId),
    /// The utterance failed; the session is over.
    Failed(MessageId, String),
}

#[derive(Debug, Clone, Copy)]
struct PlaybackSession {
    message: MessageId,
    active: bool,
}

/// Fixed synthesis parameters applied to every utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechParams {
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

impl From<&PlaybackConfig> for SpeechParams {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            pitch: config.pitch,
            rate: config.rate,
            volume: config.volume,
        }
    }
}

// ---------------------------------------------------------------------------
// VoicePlaybackController
// ---------------------------------------------------------------------------

pub struct VoicePlaybackController {
    engine: Box<dyn SpeechSynthesizer>,
    policy: VoicePolicy,
    params: SpeechParams,
    catalog: VoiceCatalog,
    session: Option<PlaybackSession>,
    events: Option<mpsc::UnboundedReceiver<SynthesisEvent>>,
    voices_changed: Option<mpsc::UnboundedReceiver<()>>,
}

impl VoicePlaybackController {
    pub fn new(mut engine: Box<dyn SpeechSynthesizer>, config: &PlaybackConfig) -> Self {
        let mut voices_changed = None;
        let catalog = if engine.is_supported() {
            let (tx, rx) = mpsc::unbounded_channel();
            engine.watch_voices(tx);
            voices_changed = Some(rx);
            VoiceCatalog::new(engine.voices())
        } else {
            VoiceCatalog::default()
        };

        Self {
            engine,
            policy: VoicePolicy::from(config),
            params: SpeechParams::from(config),
            catalog,
            session: None,
            events: None,
            voices_changed,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.engine.is_supported()
    }

    /// `true` once the engine has confirmed the live utterance started.
    pub fn is_active(&self) -> bool {
        self.session.is_some_and(|s| s.active)
    }

    /// `true` from `speak` until the utterance ends or is cancelled.
    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }

    /// The message whose text is being spoken.
    pub fn speaking(&self) -> Option<MessageId> {
        self.session.map(|s| s.message)
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// Speak `text` on behalf of `message`.
    ///
    /// Returns `false` without doing anything when playback is unsupported,
    /// an utterance is already live, or the engine refuses.
    pub fn speak(&mut self, message: MessageId, text: &str) -> bool {
        if !self.is_supported() {
            return false;
        }
        if self.is_live() {
            log::debug!("playback: speak ignored, utterance already live");
            return false;
        }

        let voice = select_voice(self.catalog.voices(), &self.policy).cloned();
        log::debug!(
            "playback: speaking message {message} with voice {:?}",
            voice.as_ref().map(|v| v.id.as_str())
        );
        let utterance = Utterance {
            text: text.to_string(),
            voice,
            pitch: self.params.pitch,
            rate: self.params.rate,
            volume: self.params.volume,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = self.engine.speak(utterance, tx) {
            log::warn!("playback: could not start utterance: {e}");
            return false;
        }

        self.session = Some(PlaybackSession {
            message,
            active: false,
        });
        self.events = Some(rx);
        true
    }

    /// Stop the live utterance.  The session is over when this returns; no
    /// end notification follows.
    pub fn cancel(&mut self) {
        if !self.is_supported() {
            return;
        }
        self.engine.cancel();
        if let Some(session) = self.session.take() {
            log::debug!("playback: cancelled message {}", session.message);
        }
        self.events = None;
    }

    /// Wait for the next signal.  Pends forever while nothing is live and the
    /// engine does not report voice changes.
    pub async fn next_event(&mut self) -> PlaybackSignal {
        loop {
            tokio::select! {
                event = recv_or_pending(&mut self.events) => {
                    return PlaybackSignal::Synthesis(event.unwrap_or(SynthesisEvent::Ended));
                }
                changed = recv_or_pending(&mut self.voices_changed) => match changed {
                    Some(()) => return PlaybackSignal::VoicesChanged,
                    None => self.voices_changed = None,
                },
            }
        }
    }

    /// Apply one signal.
    pub fn handle_event(&mut self, signal: PlaybackSignal) -> Option<PlaybackUpdate> {
        match signal {
            PlaybackSignal::VoicesChanged => {
                if self.catalog.refresh(self.engine.voices()) {
                    log::debug!("playback: {} voices available", self.catalog.voices().len());
                }
                None
            }
            PlaybackSignal::Synthesis(event) => {
                let session = self.session.as_mut()?;
                match event {
                    SynthesisEvent::Started => {
                        session.active = true;
                        Some(PlaybackUpdate::Started(session.message))
                    }
                    SynthesisEvent::Ended => {
                        let message = session.message;
                        self.end_session();
                        Some(PlaybackUpdate::Finished(message))
                    }
                    SynthesisEvent::Error(error) => {
                        let message = session.message;
                        log::warn!("playback: synthesis error for message {message}: {error}");
                        self.end_session();
                        Some(PlaybackUpdate::Failed(message, error))
                    }
                }
            }
        }
    }

    fn end_session(&mut self) {
        self.session = None;
        self.events = None;
    }
}

impl Drop for VoicePlaybackController {
    fn drop(&mut self) {
        if self.is_supported() {
            self.engine.unwatch_voices();
            self.engine.cancel();
        }
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::conversation::Transcript;
    use crate::playback::synthesizer::{PlaybackError, Voice};

    // -----------------------------------------------------------------------
    // Test double
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Engine {
        voices: Vec<Voice>,
        spoken: Vec<Utterance>,
        sinks: Vec<mpsc::UnboundedSender<SynthesisEvent>>,
        cancels: usize,
        watcher: Option<mpsc::UnboundedSender<()>>,
        unwatched: bool,
    }

    struct FakeSynth(Arc<Mutex<Engine>>);

    impl SpeechSynthesizer for FakeSynth {
        fn is_supported(&self) -> bool {
            true
        }
        fn voices(&self) -> Vec<Voice> {
            self.0.lock().unwrap().voices.clone()
        }
        fn speak(
            &mut self,
            utterance: Utterance,
            sink: mpsc::UnboundedSender<SynthesisEvent>,
        ) -> Result<(), PlaybackError> {
            let mut e = self.0.lock().unwrap();
            e.spoken.push(utterance);
            e.sinks.push(sink);
            Ok(())
        }
        fn cancel(&mut self) {
            self.0.lock().unwrap().cancels += 1;
        }
        fn watch_voices(&mut self, sink: mpsc::UnboundedSender<()>) {
            self.0.lock().unwrap().watcher = Some(sink);
        }
        fn unwatch_voices(&mut self) {
            let mut e = self.0.lock().unwrap();
            e.watcher = None;
            e.unwatched = true;
        }
    }

    fn ids(n: usize) -> Vec<MessageId> {
        let mut t = Transcript::new();
        (0..n).map(|i| t.push_assistant(format!("m{i}"), None)).collect()
    }

    fn controller(voices: Vec<Voice>) -> (VoicePlaybackController, Arc<Mutex<Engine>>) {
        let engine = Arc::new(Mutex::new(Engine {
            voices,
            ..Engine::default()
        }));
        let ctl = VoicePlaybackController::new(
            Box::new(FakeSynth(Arc::clone(&engine))),
            &PlaybackConfig::default(),
        );
        (ctl, engine)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn speak_applies_voice_policy_and_fixed_params() {
        let (mut ctl, engine) =
            controller(vec![Voice::new("en", "en-US").as_default(), Voice::new("hi", "hi-IN")]);
        let id = ids(1)[0];
        assert!(ctl.speak(id, "namaste"));

        let e = engine.lock().unwrap();
        let u = &e.spoken[0];
        assert_eq!(u.text, "namaste");
        assert_eq!(u.voice.as_ref().unwrap().id, "hi");
        assert_eq!(u.pitch, 1.0);
        assert_eq!(u.rate, 0.95);
        assert_eq!(u.volume, 1.0);
    }

    #[test]
    fn speak_is_refused_while_live() {
        let (mut ctl, engine) = controller(Vec::new());
        let m = ids(2);
        assert!(ctl.speak(m[0], "a"));
        assert!(!ctl.speak(m[1], "b"));
        assert_eq!(engine.lock().unwrap().spoken.len(), 1);
        assert_eq!(ctl.speaking(), Some(m[0]));
    }

    #[test]
    fn start_confirmation_activates_and_end_notifies() {
        let (mut ctl, _engine) = controller(Vec::new());
        let id = ids(1)[0];
        ctl.speak(id, "a");
        assert!(!ctl.is_active());

        let u = ctl.handle_event(PlaybackSignal::Synthesis(SynthesisEvent::Started));
        assert_eq!(u, Some(PlaybackUpdate::Started(id)));
        assert!(ctl.is_active());

        let u = ctl.handle_event(PlaybackSignal::Synthesis(SynthesisEvent::Ended));
        assert_eq!(u, Some(PlaybackUpdate::Finished(id)));
        assert!(!ctl.is_active());
        assert_eq!(ctl.speaking(), None);
    }

    #[test]
    fn engine_error_clears_session() {
        let (mut ctl, _engine) = controller(Vec::new());
        let id = ids(1)[0];
        ctl.speak(id, "a");
        ctl.handle_event(PlaybackSignal::Synthesis(SynthesisEvent::Started));
        let u = ctl.handle_event(PlaybackSignal::Synthesis(SynthesisEvent::Error("audio-busy".into())));
        assert_eq!(u, Some(PlaybackUpdate::Failed(id, "audio-busy".into())));
        assert!(!ctl.is_live());
    }

    #[test]
    fn cancel_is_synchronous() {
        let (mut ctl, engine) = controller(Vec::new());
        let id = ids(1)[0];
        ctl.speak(id, "a");
        ctl.handle_event(PlaybackSignal::Synthesis(SynthesisEvent::Started));

        ctl.cancel();
        assert!(!ctl.is_active());
        assert_eq!(ctl.speaking(), None);
        assert_eq!(engine.lock().unwrap().cancels, 1);
    }

    #[tokio::test]
    async fn cancelled_utterance_events_do_not_reach_the_next_one() {
        let (mut ctl, engine) = controller(Vec::new());
        let m = ids(2);
        ctl.speak(m[0], "a");
        ctl.cancel();
        ctl.speak(m[1], "b");

        let (old, new) = {
            let e = engine.lock().unwrap();
            (e.sinks[0].clone(), e.sinks[1].clone())
        };
        // The first utterance's channel is closed; its late end is lost.
        assert!(old.send(SynthesisEvent::Ended).is_err());

        new.send(SynthesisEvent::Started).unwrap();
        let signal = ctl.next_event().await;
        assert_eq!(ctl.handle_event(signal), Some(PlaybackUpdate::Started(m[1])));
        assert_eq!(ctl.speaking(), Some(m[1]));
    }

    #[tokio::test]
    async fn voice_list_refresh_keeps_last_non_empty_list() {
        let (mut ctl, engine) = controller(Vec::new());
        assert!(ctl.catalog().voices().is_empty());

        let watcher = {
            let mut e = engine.lock().unwrap();
            e.voices = vec![Voice::new("hi", "hi-IN")];
            e.watcher.clone().unwrap()
        };
        watcher.send(()).unwrap();
        let signal = ctl.next_event().await;
        assert_eq!(signal, PlaybackSignal::VoicesChanged);
        assert_eq!(ctl.handle_event(signal), None);
        assert_eq!(ctl.catalog().voices().len(), 1);

        engine.lock().unwrap().voices.clear();
        ctl.handle_event(PlaybackSignal::VoicesChanged);
        assert_eq!(ctl.catalog().voices().len(), 1);
    }

    #[test]
    fn drop_cancels_and_detaches() {
        let (mut ctl, engine) = controller(Vec::new());
        ctl.speak(ids(1)[0], "a");
        drop(ctl);
        let e = engine.lock().unwrap();
        assert_eq!(e.cancels, 1);
        assert!(e.unwatched);
        assert!(e.watcher.is_none());
    }

    #[test]
    fn unsupported_engine_never_speaks() {
        let mut ctl = VoicePlaybackController::new(
            Box::new(crate::playback::UnsupportedSynthesizer),
            &PlaybackConfig::default(),
        );
        assert!(!ctl.is_supported());
        assert!(!ctl.speak(ids(1)[0], "a"));
        ctl.cancel();
        assert!(!ctl.is_live());
    }
}
