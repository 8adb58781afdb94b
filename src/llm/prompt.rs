//! Prompts for the conversation model and the pronunciation renderer.
//!
//! [`PromptBuilder`] turns the transcript into the `messages` array of an
//! OpenAI-compatible `/chat/completions` request, and wraps reply text in
//! the pronunciation-rendering prompt.

use serde_json::{json, Value};

use crate::conversation::{Message, Role};

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

/// Conversation persona: reply in Kashmiri (Koshur) only.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "\
You are a friendly and helpful assistant who is an expert in the Kashmiri language (Koshur). \
Your primary goal is to communicate exclusively in Kashmiri. Do not use English or any other \
language in your responses, unless the user specifically asks for a translation. Maintain a \
warm and respectful tone in all conversations.";

/// Phonetic rendering of Kashmiri into Devanagari for a Hindi voice.
pub const PRONUNCIATION_SYSTEM_INSTRUCTION: &str = "\
You are an expert linguist. Convert the given Kashmiri text into a phonetically equivalent \
Hindi text using Devanagari script. The goal is to create a version that a Hindi \
text-to-speech engine can pronounce to sound like authentic Kashmiri. This is for \
pronunciation, not literal meaning. Output only the Hindi text.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds chat-message arrays and the pronunciation prompt.
///
/// # Example
/// ```rust
/// use voice_chat::llm::PromptBuilder;
///
/// let builder = PromptBuilder::new("Be brief.", 10);
/// let messages = builder.conversation(&[], "Hello");
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0]["role"], "system");
/// assert_eq!(messages[1]["content"], "Hello");
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_instruction: String,
    history_limit: usize,
}

impl PromptBuilder {
    pub fn new(system_instruction: impl Into<String>, history_limit: usize) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history_limit,
        }
    }

    /// `[system, …last history_limit messages…, user(text)]`.
    ///
    /// Messages with empty text are skipped; an endpoint rejects empty
    /// turns.
    pub fn conversation(&self, history: &[Message], text: &str) -> Vec<Value> {
        let usable: Vec<&Message> = history.iter().filter(|m| !m.text.is_empty()).collect();
        let skip = usable.len().saturating_sub(self.history_limit);

        let mut messages = Vec::with_capacity(usable.len() - skip + 2);
        if !self.system_instruction.is_empty() {
            messages.push(json!({ "role": "system", "content": self.system_instruction }));
        }
        for msg in usable.into_iter().skip(skip) {
            messages.push(json!({ "role": role_name(msg.role), "content": msg.text }));
        }
        messages.push(json!({ "role": "user", "content": text }));
        messages
    }
}

/// The user-turn content of a pronunciation request.
pub fn pronunciation_prompt(text: &str) -> String {
    format!("Convert the following Kashmiri text for Hindi text-to-speech: \"{text}\"")
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
