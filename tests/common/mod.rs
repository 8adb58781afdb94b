//! Scripted engines and a harness around a spawned orchestrator.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use voice_chat::capture::{CaptureError, RecognitionEvent, RecognitionOptions, SpeechRecognizer};
use voice_chat::config::AppConfig;
use voice_chat::conversation::{ConversationHandle, ConversationView, Message, Orchestrator, Services};
use voice_chat::llm::{LlmError, PronunciationTranslator, ResponseStreamer, TextStream};
use voice_chat::playback::{PlaybackError, SpeechSynthesizer, SynthesisEvent, Utterance, Voice};

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Ordered record of every call made into the doubles.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

pub type Feed = mpsc::UnboundedSender<Result<String, LlmError>>;

/// Each `stream` call plays the next scripted reply; with no script left
/// the reply is empty.
pub struct ScriptedStreamer {
    scripts: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<String, LlmError>>>>,
    log: Log,
}

impl ResponseStreamer for ScriptedStreamer {
    fn stream(&self, history: &[Message], text: &str) -> TextStream {
        self.log.push(format!("stream:{text}"));
        self.log.push(format!("history:{}", history.len()));
        match self.scripts.lock().unwrap().pop_front() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}

pub struct ScriptedTranslator {
    result: Result<String, LlmError>,
    log: Log,
}

#[async_trait]
impl PronunciationTranslator for ScriptedTranslator {
    async fn render(&self, text: &str) -> Result<String, LlmError> {
        self.log.push(format!("render:{text}"));
        self.result.clone()
    }
}

pub type Slot<T> = Arc<Mutex<Option<T>>>;

pub struct FakeRecognizer {
    sink: Slot<mpsc::UnboundedSender<RecognitionEvent>>,
    log: Log,
}

impl SpeechRecognizer for FakeRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(
        &mut self,
        options: &RecognitionOptions,
        sink: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), CaptureError> {
        self.log.push(format!("capture:start:{}", options.language));
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.push("capture:stop");
    }

    fn abort(&mut self) {
        self.log.push("capture:abort");
    }
}

pub struct FakeSynth {
    sink: Slot<mpsc::UnboundedSender<SynthesisEvent>>,
    log: Log,
}

impl SpeechSynthesizer for FakeSynth {
    fn is_supported(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("hi", "hi-IN")]
    }

    fn speak(
        &mut self,
        utterance: Utterance,
        sink: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Result<(), PlaybackError> {
        self.log.push(format!("speak:{}", utterance.text));
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn cancel(&mut self) {
        self.log.push("cancel");
    }

    fn watch_voices(&mut self, _sink: mpsc::UnboundedSender<()>) {}

    fn unwatch_voices(&mut self) {}
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Options {
    pub service: Result<(), LlmError>,
    pub translation: Result<String, LlmError>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            service: Ok(()),
            translation: Ok("रेंडर".into()),
        }
    }
}

pub struct Harness {
    pub handle: ConversationHandle,
    pub task: JoinHandle<()>,
    pub views: watch::Receiver<ConversationView>,
    pub log: Log,
    streamer: Arc<ScriptedStreamer>,
    capture_sink: Slot<mpsc::UnboundedSender<RecognitionEvent>>,
    synth_sink: Slot<mpsc::UnboundedSender<SynthesisEvent>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Options::default())
    }

    pub fn with(options: Options) -> Self {
        let log = Log::default();
        let streamer = Arc::new(ScriptedStreamer {
            scripts: Mutex::new(VecDeque::new()),
            log: log.clone(),
        });
        let capture_sink: Slot<_> = Arc::default();
        let synth_sink: Slot<_> = Arc::default();

        let services = Services {
            streamer: options
                .service
                .map(|()| Arc::clone(&streamer) as Arc<dyn ResponseStreamer>),
            translator: Some(Arc::new(ScriptedTranslator {
                result: options.translation,
                log: log.clone(),
            })),
            recognizer: Box::new(FakeRecognizer {
                sink: Arc::clone(&capture_sink),
                log: log.clone(),
            }),
            synthesizer: Box::new(FakeSynth {
                sink: Arc::clone(&synth_sink),
                log: log.clone(),
            }),
        };

        let (handle, task) = Orchestrator::new(services, &AppConfig::default()).spawn();
        let views = handle.subscribe();
        Self {
            handle,
            task,
            views,
            log,
            streamer,
            capture_sink,
            synth_sink,
        }
    }

    /// Script the reply to the next submission.  Dropping the feed ends it.
    pub fn script_reply(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streamer.scripts.lock().unwrap().push_back(rx);
        tx
    }

    pub fn capture_sink(&self) -> mpsc::UnboundedSender<RecognitionEvent> {
        self.capture_sink.lock().unwrap().clone().expect("no capture session")
    }

    pub fn synth_sink(&self) -> mpsc::UnboundedSender<SynthesisEvent> {
        self.synth_sink.lock().unwrap().clone().expect("no utterance")
    }

    pub fn view(&self) -> ConversationView {
        self.views.borrow().clone()
    }

    /// Wait until a published view satisfies `pred`.
    pub async fn until(&mut self, pred: impl FnMut(&ConversationView) -> bool) -> ConversationView {
        let view = tokio::time::timeout(Duration::from_secs(5), self.views.wait_for(pred))
            .await
            .expect("timed out waiting for view")
            .expect("orchestrator gone");
        view.clone()
    }
}
