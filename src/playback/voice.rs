//! Voice selection policy and the cached voice list.

use crate::config::PlaybackConfig;

use super::synthesizer::Voice;

/// Ranked voice preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePolicy {
    /// Exact locales, best first.
    pub preferred_locales: Vec<String>,
    /// Locale prefix tried when no preferred locale matches.
    pub fallback_prefix: String,
}

impl From<&PlaybackConfig> for VoicePolicy {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            preferred_locales: config.preferred_locales.clone(),
            fallback_prefix: config.fallback_locale_prefix.clone(),
        }
    }
}

/// Pick a voice in priority order:
///
/// 1. first exact match for each preferred locale, in ranking order;
/// 2. first voice whose locale starts with the fallback prefix;
/// 3. the engine's default voice;
/// 4. the first voice.
///
/// Returns `None` only for an empty list.
///
/// ```
/// use voice_chat::playback::{select_voice, Voice, VoicePolicy};
///
/// let voices = vec![Voice::new("en", "en-US").as_default(), Voice::new("hi", "hi-IN")];
/// let policy = VoicePolicy {
///     preferred_locales: vec!["hi-IN".into()],
///     fallback_prefix: "en-IN".into(),
/// };
/// assert_eq!(select_voice(&voices, &policy).unwrap().id, "hi");
/// ```
pub fn select_voice<'a>(voices: &'a [Voice], policy: &VoicePolicy) -> Option<&'a Voice> {
    policy
        .preferred_locales
        .iter()
        .find_map(|locale| voices.iter().find(|v| v.lang == *locale))
        .or_else(|| {
            if policy.fallback_prefix.is_empty() {
                None
            } else {
                voices
                    .iter()
                    .find(|v| v.lang.starts_with(policy.fallback_prefix.as_str()))
            }
        })
        .or_else(|| voices.iter().find(|v| v.default))
        .or_else(|| voices.first())
}

/// Last non-empty voice list reported by the engine.
///
/// Engines often report an empty list while still loading; such reports
/// never replace a list that is already known.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    /// Returns `true` when the list was replaced.
    pub fn refresh(&mut self, voices: Vec<Voice>) -> bool {
        if voices.is_empty() {
            return false;
        }
        self.voices = voices;
        true
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }
}
