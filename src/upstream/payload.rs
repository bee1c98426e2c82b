//! Chat-completions wire types.

use serde::{Deserialize, Serialize};

use crate::routing::RoutingDecision;
use crate::types::{Message, Role};
use crate::{HermodError, Result};

/// Default number of history turns forwarded upstream.
pub const DEFAULT_HISTORY_TURNS: usize = 10;

/// Body of `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Assemble the upstream payload for a routed request.
    ///
    /// Messages are the decision's system prompt, then the most recent
    /// `history_turns` client turns (client-supplied system messages are
    /// dropped), then the current user message.
    pub fn build(
        decision: &RoutingDecision,
        history: &[Message],
        message: &str,
        history_turns: usize,
    ) -> Self {
        let turns: Vec<&Message> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let recent = &turns[turns.len().saturating_sub(history_turns)..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(Message::system(decision.system_prompt.clone()));
        messages.extend(recent.iter().map(|m| (*m).clone()));
        messages.push(Message::user(message));

        Self {
            model: decision.model_id.clone(),
            messages,
            temperature: decision.temperature,
            max_tokens: decision.max_tokens,
            stop: decision.stop_sequences.clone(),
            stream: decision.streaming,
        }
    }

    /// Same payload addressed to another model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// Total characters across all message contents.
    pub fn char_len(&self) -> usize {
        self.messages.iter().map(Message::char_len).sum()
    }
}

/// A non-streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Model that produced the text.
    pub model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a chat-completions response body.
///
/// Reads `choices[0].message.content`, falling back to `choices[0].text`.
/// An `error` object in the body is an API error even on a 2xx status;
/// blank text is [`HermodError::EmptyResponse`].
pub fn parse_completion(body: &str, requested_model: &str) -> Result<Completion> {
    let parsed: CompletionBody = serde_json::from_str(body)?;
    if let Some(error) = parsed.error {
        return Err(HermodError::Api {
            status: 200,
            message: error_message(&error),
        });
    }
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.and_then(|m| m.content).or(c.text))
        .filter(|t| !t.trim().is_empty())
        .ok_or(HermodError::EmptyResponse)?;
    Ok(Completion {
        text,
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
    })
}

/// Best-effort human readable message from an upstream error value.
pub(crate) fn error_message(error: &serde_json::Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
