//! Inbound request and outbound reply records for the proxy endpoint.

use serde::{Deserialize, Serialize};

use super::{Category, Message};
use crate::{HermodError, Result};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Overrides the category's default streaming mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            user_id: None,
            stream: None,
        }
    }

    pub fn history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Reject requests that carry nothing to answer.
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(HermodError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Non-streaming reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    pub cls: Category,
    pub cached: bool,
}

/// Error body returned for every failure that happens before streaming starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&HermodError> for ErrorBody {
    fn from(err: &HermodError) -> Self {
        Self {
            error: err.public_message(),
        }
    }
}
