//! Speech synthesis through an external program such as `espeak-ng`.
//!
//! The configured command line is run once per utterance with the text as
//! its final argument.  These placeholders are expanded inside arguments:
//!
//! | Placeholder   | Value                                         |
//! |---------------|-----------------------------------------------|
//! | `{voice}`     | selected voice id                             |
//! | `{wpm}`       | `rate × 175`, words per minute                |
//! | `{pitch}`     | `pitch × 50` (0–99 scale)                     |
//! | `{amplitude}` | `volume × 100` (0–200 scale)                  |
//!
//! When no voice is selected, an argument containing `{voice}` is dropped
//! together with a directly preceding flag (`-v {voice}` disappears).

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::config::PlaybackConfig;

use super::synthesizer::{PlaybackError, SpeechSynthesizer, SynthesisEvent, Utterance, Voice};

pub struct CommandSynthesizer {
    command: Vec<String>,
    voices: Vec<Voice>,
    current: Option<oneshot::Sender<()>>,
}

impl CommandSynthesizer {
    pub fn new(command: Vec<String>, voices: Vec<Voice>) -> Self {
        Self {
            command,
            voices,
            current: None,
        }
    }

    /// `None` when the config has no usable command.
    pub fn from_config(config: &PlaybackConfig) -> Option<Self> {
        let command = config.command.clone()?;
        if command.first().map_or(true, |p| p.trim().is_empty()) {
            return None;
        }
        Some(Self::new(command, config.voices.clone()))
    }
}

/// Expand placeholders and append the text.  Returns `(program, args)`.
pub fn build_args(command: &[String], utterance: &Utterance) -> Option<(String, Vec<String>)> {
    let (program, template) = command.split_first()?;

    let wpm = ((utterance.rate * 175.0).round() as u32).to_string();
    let pitch = ((utterance.pitch * 50.0).round().clamp(0.0, 99.0) as u32).to_string();
    let amplitude = ((utterance.volume * 100.0).round().clamp(0.0, 200.0) as u32).to_string();

    let mut args: Vec<String> = Vec::with_capacity(template.len() + 1);
    for arg in template {
        if arg.contains("{voice}") {
            match &utterance.voice {
                Some(voice) => args.push(arg.replace("{voice}", &voice.id)),
                None => {
                    if args.last().is_some_and(|prev| prev.starts_with('-')) {
                        args.pop();
                    }
                }
            }
            continue;
        }
        args.push(
            arg.replace("{wpm}", &wpm)
                .replace("{pitch}", &pitch)
                .replace("{amplitude}", &amplitude),
        );
    }
    args.push(utterance.text.clone());

    Some((program.clone(), args))
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn is_supported(&self) -> bool {
        !self.command.is_empty()
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(
        &mut self,
        utterance: Utterance,
        sink: mpsc::UnboundedSender<SynthesisEvent>,
    ) -> Result<(), PlaybackError> {
        let (program, args) = build_args(&self.command, &utterance).ok_or(PlaybackError::Unsupported)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlaybackError::Engine(format!("no async runtime: {e}")))?;

        let mut child = {
            // `spawn` registers the child with the runtime's reactor.
            let _guard = runtime.enter();
            Command::new(&program)
                .args(&args)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| PlaybackError::Engine(format!("{program}: {e}")))?
        };

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.current = Some(cancel_tx);

        runtime.spawn(async move {
            let _ = sink.send(SynthesisEvent::Started);
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(s) if s.success() => SynthesisEvent::Ended,
                        Ok(s) => SynthesisEvent::Error(format!("synthesizer exited with {s}")),
                        Err(e) => SynthesisEvent::Error(e.to_string()),
                    };
                    let _ = sink.send(event);
                }
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        log::debug!("playback: kill after cancel failed: {e}");
                    }
                }
            }
        });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.current.take() {
            let _ = cancel.send(());
        }
    }

    // The voice list comes from the config and never changes.
    fn watch_voices(&mut self, _sink: mpsc::UnboundedSender<()>) {}

    fn unwatch_voices(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
