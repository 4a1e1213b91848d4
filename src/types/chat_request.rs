use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RoleMessage;

/// Body accepted by the relay endpoints.
///
/// Current clients send the whole conversation in `messages`; older clients
/// send a single `message` string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Ordered conversation, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<RoleMessage>>,

    /// Single user message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatRequest {
    /// Create a request carrying a full conversation.
    pub fn from_messages(messages: Vec<RoleMessage>) -> Self {
        Self {
            messages: Some(messages),
            message: None,
        }
    }

    /// Create a request carrying a single user message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            messages: None,
            message: Some(message.into()),
        }
    }

    /// Validate the request and produce the message list for the provider.
    ///
    /// Blank entries in `messages` are dropped. When nothing usable is left the
    /// single `message` is used instead; when that is blank too the request is
    /// rejected with [`Error::InvalidRequest`].
    pub fn into_messages(self) -> Result<Vec<RoleMessage>> {
        let messages: Vec<RoleMessage> = self
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter(|m| !m.is_blank())
            .collect();
        if !messages.is_empty() {
            return Ok(messages);
        }
        match self.message {
            Some(message) if !message.trim().is_empty() => Ok(vec![RoleMessage::user(message)]),
            _ => Err(Error::invalid_request(
                "Either 'message' or a non-empty 'messages' list is required",
            )),
        }
    }
}

/// Body returned by the non-streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    /// The complete assistant reply.
    pub reply: String,
}

/// Body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Client-safe description of what went wrong.
    pub error: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            error: err.client_message(),
        }
    }
}
