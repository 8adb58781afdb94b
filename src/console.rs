//! Line-oriented rendering surface for the terminal.
//!
//! [`Renderer`] turns successive [`ConversationView`]s into terminal output:
//! messages are printed once, streamed replies grow in place, and status
//! changes (errors, playback, voice input) get a line each.  [`parse_line`]
//! maps stdin lines to [`Input`]s.
//!
//! | Input          | Action                              |
//! |----------------|-------------------------------------|
//! | plain text     | submit as a user turn               |
//! | `/play <id>`   | start or stop speaking a reply      |
//! | `/listen`      | start voice input                   |
//! | `/stop`        | stop voice input                    |
//! | `/help`        | list commands                       |
//! | `/quit`        | end the session                     |

use std::collections::HashSet;
use std::io::Write;

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::conversation::{
    ConversationHandle, ConversationView, MessageId, PlaybackToggle, Role, TurnPhase,
};

const HELP: &str = "\
commands: <text> send · /play <id> speak or stop a reply · /listen voice input · /stop · /quit\n";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Say(String),
    Play(MessageId),
    Listen,
    Stop,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command `/{0}` (try /help)")]
    Unknown(String),

    #[error("usage: /play <message id>")]
    MissingId,

    #[error("`{0}` is not a message id")]
    BadId(String),
}

/// Parse one line of user input.  Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Input>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Input::Say(line.to_string())));
    };

    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(name, arg)| (name, arg.trim()));
    let input = match name {
        "play" => {
            if arg.is_empty() {
                return Err(InputError::MissingId);
            }
            let id = arg
                .parse()
                .map_err(|_| InputError::BadId(arg.to_string()))?;
            Input::Play(id)
        }
        "listen" => Input::Listen,
        "stop" => Input::Stop,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Remembers what has been printed so each view only adds what changed.
#[derive(Debug, Default)]
pub struct Renderer {
    announced: bool,
    printed: HashSet<MessageId>,
    /// Reply currently growing on the last line, and how much of it is out.
    streaming: Option<(MessageId, usize)>,
    phase: TurnPhase,
    error: Option<String>,
    speaking: Option<MessageId>,
    capturing: bool,
    interim: String,
}

impl Renderer {
    pub fn render(&mut self, view: &ConversationView) -> String {
        let mut out = String::new();

        if !self.announced {
            self.announced = true;
            if !view.capabilities.capture {
                out.push_str("(voice input is not supported on this host)\n");
            }
            if !view.capabilities.playback {
                out.push_str("(spoken replies are off: no speech synthesizer configured)\n");
            }
        }

        if let Some((id, _)) = self.streaming {
            if view.message(id).is_none() {
                out.push_str(" [discarded]\n");
                self.streaming = None;
            }
        }

        for message in &view.messages {
            if self.printed.contains(&message.id) {
                continue;
            }
            match self.streaming {
                Some((id, offset)) if id == message.id => {
                    out.push_str(message.text.get(offset..).unwrap_or_default());
                }
                _ => out.push_str(&format!(
                    "[{}] {}: {}",
                    message.id,
                    speaker(message.role),
                    message.text
                )),
            }
            if view.draft == Some(message.id) {
                self.streaming = Some((message.id, message.text.len()));
            } else {
                out.push('\n');
                self.streaming = None;
                self.printed.insert(message.id);
            }
        }

        if view.error != self.error {
            if let Some(error) = &view.error {
                out.push_str(&format!("! {error}\n"));
            }
            self.error = view.error.clone();
        }

        // Status lines wait until the streamed reply has ended its line.
        if self.streaming.is_none() {
            self.render_status(view, &mut out);
        }
        out
    }

    fn render_status(&mut self, view: &ConversationView, out: &mut String) {
        if view.phase != self.phase {
            if view.phase == TurnPhase::Translating {
                out.push_str("(preparing audio…)\n");
            }
            self.phase = view.phase;
        }

        if view.speaking != self.speaking {
            match view.speaking {
                Some(id) => out.push_str(&format!("(speaking [{id}])\n")),
                None => out.push_str("(done speaking)\n"),
            }
            self.speaking = view.speaking;
        }

        if view.capturing != self.capturing {
            out.push_str(if view.capturing {
                "(listening… /stop to finish)\n"
            } else {
                "(stopped listening)\n"
            });
            self.capturing = view.capturing;
        }
        if view.interim != self.interim {
            if !view.interim.is_empty() {
                out.push_str(&format!("(hearing) {}\n", view.interim));
            }
            self.interim = view.interim.clone();
        }
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    }
}

// ---------------------------------------------------------------------------
// Console loop
// ---------------------------------------------------------------------------

/// Drive the conversation from stdin until `/quit`, end of input, or the
/// orchestrator going away.
pub async fn run(handle: ConversationHandle) -> anyhow::Result<()> {
    let mut views = handle.subscribe();
    let mut renderer = Renderer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    write_out(HELP)?;
    let out = renderer.render(&views.borrow_and_update());
    write_out(&out)?;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let out = renderer.render(&views.borrow_and_update());
                write_out(&out)?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(input)) => dispatch(&handle, input).await?,
                    Ok(None) => {}
                    Err(e) => write_out(&format!("! {e}\n"))?,
                }
            }
        }
    }
    Ok(())
}

async fn dispatch(handle: &ConversationHandle, input: Input) -> anyhow::Result<()> {
    match input {
        Input::Say(text) => {
            if let Err(e) = handle.submit(text).await {
                write_out(&format!("! {e}\n"))?;
            }
        }
        Input::Play(id) => match handle.toggle_playback(id).await {
            Ok(PlaybackToggle::Started) => {}
            Ok(PlaybackToggle::Stopped) => write_out(&format!("(stopped [{id}])\n"))?,
            Err(e) => write_out(&format!("! {e}\n"))?,
        },
        Input::Listen => {
            if handle.view().capabilities.capture {
                handle.start_capture().await?;
            } else {
                write_out("! voice input is not supported on this host\n")?;
            }
        }
        Input::Stop => handle.stop_capture().await?,
        Input::Help => write_out(HELP)?,
        Input::Quit => {}
    }
    Ok(())
}

fn write_out(text: &str) -> anyhow::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
