//! Speech recognition through an external program.
//!
//! The configured command line is started once per session with its
//! standard output piped back.  `{language}` inside an argument expands to
//! the session language.  Every output line is one recognition result:
//!
//! | Line                       | Result                        |
//! |----------------------------|-------------------------------|
//! | `{"partial": "sal"}`       | interim `sal`                 |
//! | `{"text": "salaam"}`       | final `salaam`                |
//! | `salaam`                   | final `salaam`                |
//!
//! The JSON shapes are those printed by Vosk-style streaming recognizers.
//! Blank lines and JSON objects carrying neither key are skipped.
//!
//! `stop` kills the program and still forwards whatever it already
//! printed before `Ended`.  `abort` kills it and forwards nothing more.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;

use crate::config::CaptureConfig;

use super::recognizer::{
    CaptureError, RecognitionEvent, RecognitionOptions, RecognitionResult, SpeechRecognizer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Stop,
    Abort,
}

pub struct CommandRecognizer {
    command: Vec<String>,
    current: Option<mpsc::UnboundedSender<Halt>>,
}

impl CommandRecognizer {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            current: None,
        }
    }

    /// `None` when the config has no usable command.
    pub fn from_config(config: &CaptureConfig) -> Option<Self> {
        let command = config.command.clone()?;
        if command.first().map_or(true, |p| p.trim().is_empty()) {
            return None;
        }
        Some(Self::new(command))
    }
}

/// Expand `{language}`.  Returns `(program, args)`.
pub fn build_args(command: &[String], options: &RecognitionOptions) -> Option<(String, Vec<String>)> {
    let (program, template) = command.split_first()?;
    let args = template
        .iter()
        .map(|arg| arg.replace("{language}", &options.language))
        .collect();
    Some((program.clone(), args))
}

/// Interpret one line of recognizer output.
pub fn parse_line(line: &str) -> Option<RecognitionResult> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(line) {
            if let Some(text) = fields.get("text").and_then(|v| v.as_str()) {
                let text = text.trim();
                return (!text.is_empty()).then(|| RecognitionResult::finalized(text));
            }
            return fields
                .get("partial")
                .and_then(|v| v.as_str())
                .map(|text| RecognitionResult::interim(text.trim()));
        }
    }
    Some(RecognitionResult::finalized(line))
}

impl SpeechRecognizer for CommandRecognizer {
    fn is_supported(&self) -> bool {
        !self.command.is_empty()
    }

    fn start(
        &mut self,
        options: &RecognitionOptions,
        sink: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), CaptureError> {
        self.abort();

        let (program, args) = build_args(&self.command, options).ok_or(CaptureError::Unsupported)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::Engine(format!("no async runtime: {e}")))?;

        let mut child = {
            let _guard = runtime.enter();
            Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| CaptureError::Engine(format!("{program}: {e}")))?
        };
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Engine(format!("{program}: no output pipe")))?;

        let (halt_tx, halt_rx) = mpsc::unbounded_channel();
        self.current = Some(halt_tx);
        runtime.spawn(run_session(child, stdout, halt_rx, sink, options.interim_results));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(halt) = &self.current {
            let _ = halt.send(Halt::Stop);
        }
    }

    fn abort(&mut self) {
        if let Some(halt) = self.current.take() {
            let _ = halt.send(Halt::Abort);
        }
    }
}

impl Drop for CommandRecognizer {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run_session(
    mut child: Child,
    stdout: ChildStdout,
    mut halt: mpsc::UnboundedReceiver<Halt>,
    sink: mpsc::UnboundedSender<RecognitionEvent>,
    interim_results: bool,
) {
    let _ = sink.send(RecognitionEvent::Started);
    let mut lines = BufReader::new(stdout).lines();
    let mut stopping = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some(result) = parse_line(&line) else { continue };
                    if !result.is_final && !interim_results {
                        continue;
                    }
                    let _ = sink.send(RecognitionEvent::Results {
                        result_index: 0,
                        results: vec![result],
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = child.start_kill();
                    let _ = sink.send(RecognitionEvent::Error(e.to_string()));
                    return;
                }
            },
            signal = halt.recv() => match signal {
                Some(Halt::Stop) => {
                    if !stopping {
                        stopping = true;
                        if let Err(e) = child.start_kill() {
                            log::debug!("capture: kill after stop failed: {e}");
                        }
                    }
                }
                Some(Halt::Abort) | None => {
                    let _ = child.start_kill();
                    return;
                }
            },
        }
    }

    let event = match child.wait().await {
        Ok(_) if stopping => RecognitionEvent::Ended,
        Ok(status) if status.success() => RecognitionEvent::Ended,
        Ok(status) => RecognitionEvent::Error(format!("recognizer exited with {status}")),
        Err(e) => RecognitionEvent::Error(e.to_string()),
    };
    let _ = sink.send(event);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
