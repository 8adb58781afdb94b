//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::llm::prompt::{CHAT_SYSTEM_INSTRUCTION, PRONUNCIATION_SYSTEM_INSTRUCTION};
use crate::playback::Voice;

/// Environment variable that overrides [`LlmConfig::api_key`].
pub const API_KEY_ENV: &str = "API_KEY";

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Connection settings for the OpenAI-compatible endpoint that serves both
/// the conversation stream and the pronunciation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API, including the version segment.  The client
    /// appends `/chat/completions`.
    ///
    /// - Gemini (OpenAI mode): `https://generativelanguage.googleapis.com/v1beta/openai`
    /// - OpenAI: `https://api.openai.com/v1`
    /// - Ollama: `http://localhost:11434/v1`
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model used for the conversation.
    pub chat_model: String,
    /// Sampling temperature for conversation replies.
    pub temperature: f32,
    /// Nucleus sampling for conversation replies.
    pub top_p: f32,
    /// Seconds to wait for the endpoint to accept a request.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key: None,
            chat_model: "gemini-2.5-flash".into(),
            temperature: 0.8,
            top_p: 0.9,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// PronunciationConfig
// ---------------------------------------------------------------------------

/// Settings for the phonetic rendering requested before playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PronunciationConfig {
    /// When `false` the original reply text is spoken directly.
    pub enabled: bool,
    /// Model used for the rendering request.
    pub model: String,
    /// System instruction sent with every rendering request.
    pub system_instruction: String,
    /// Sampling temperature.  Kept low so renderings are stable.
    pub temperature: f32,
    /// Maximum seconds to wait for a rendering.
    pub timeout_secs: u64,
}

impl Default for PronunciationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gemini-2.5-flash".into(),
            system_instruction: PRONUNCIATION_SYSTEM_INSTRUCTION.into(),
            temperature: 0.1,
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Assistant message shown before the first turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub text: String,
    /// Preset pronunciation rendering, so the greeting can be played without
    /// a rendering request.
    pub pronunciation: Option<String>,
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// System instruction for the conversation model.
    pub system_instruction: String,
    /// Greeting seeded into the transcript once the service is up.
    pub greeting: Option<Greeting>,
    /// Maximum number of previous messages sent as context with each turn.
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_instruction: CHAT_SYSTEM_INSTRUCTION.into(),
            greeting: Some(Greeting {
                text: "آسِو وَصْل! بہٕ چھُس تُہُنٛد کٲشُر اے آے مددگار۔ ک‍‍یتھٕ پٲٹھۍ کَران بہٕ تُہِہ مَدَتھ؟".into(),
                pronunciation: Some(
                    "आस्यव वसल! बह छुस तोहुंद कशुर एआई मददगार। केथ पाठी करान बह तोहि मदद?".into(),
                ),
            }),
            history_limit: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-recognition session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// BCP-47 language tag handed to the recognizer.
    pub language: String,
    /// Keep listening across pauses until a final result arrives.
    pub continuous: bool,
    /// Deliver provisional results while the user is still speaking.
    pub interim_results: bool,
    /// External recognizer program and its arguments, e.g.
    /// `["vosk-listen", "--lang", "{language}"]`.  `None` disables capture.
    pub command: Option<Vec<String>>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "ks-IN".into(),
            continuous: true,
            interim_results: true,
            command: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Settings for speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Locales tried in order for an exact voice match.
    pub preferred_locales: Vec<String>,
    /// Locale prefix tried when no preferred locale has a voice.
    pub fallback_locale_prefix: String,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
    /// External synthesizer program and its arguments, e.g.
    /// `["espeak-ng", "-v", "{voice}"]`.  `None` disables playback.
    pub command: Option<Vec<String>>,
    /// Voices the external program offers.
    pub voices: Vec<Voice>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            preferred_locales: vec![
                "hi-IN".into(),
                "ur-IN".into(),
                "ur-PK".into(),
                "ks-IN".into(),
            ],
            fallback_locale_prefix: "en-IN".into(),
            pitch: 1.0,
            rate: 0.95,
            volume: 1.0,
            command: None,
            voices: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_chat::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Endpoint connection settings.
    pub llm: LlmConfig,
    /// Conversation behaviour.
    pub chat: ChatConfig,
    /// Pronunciation rendering settings.
    pub pronunciation: PronunciationConfig,
    /// Speech recognition settings.
    pub capture: CaptureConfig,
    /// Speech synthesis settings.
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables.
    ///
    /// An empty `API_KEY` is ignored so it cannot blank out a key stored in
    /// `settings.toml`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key.trim().to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
