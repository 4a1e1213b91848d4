//! Wire types for the OpenAI-compatible chat completions API.

use serde::{Deserialize, Serialize};

use crate::types::RoleMessage;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// The model to complete with.
    pub model: String,

    /// Conversation, oldest first.
    pub messages: Vec<RoleMessage>,

    /// Whether the provider should stream increments.
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a new request.
    pub fn new(model: impl Into<String>, messages: Vec<RoleMessage>, stream: bool) -> Self {
        Self {
            model: model.into(),
            messages,
            stream,
        }
    }
}

/// A complete, non-streamed completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    /// Candidate replies; only the first is used.
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

impl ChatCompletion {
    /// Text of the first choice, empty when the provider returned none.
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default()
    }
}

/// One choice of a non-streamed completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    /// The assistant message.
    #[serde(default)]
    pub message: CompletionMessage,
}

/// Assistant message inside a completion choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionMessage {
    /// The text, absent for refusals and tool calls.
    #[serde(default)]
    pub content: Option<String>,
}

/// One streamed increment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    /// Per-choice deltas; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Set when the provider aborts mid-stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

impl ChatCompletionChunk {
    /// Build a chunk carrying `text` as its first delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(text.into()),
                },
            }],
            error: None,
        }
    }

    /// The text carried by this increment, if it carries any.
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// One choice of a streamed increment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    /// The delta for this choice.
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Incremental content of a streamed choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    /// Text fragment; absent on role-only and final increments.
    #[serde(default)]
    pub content: Option<String>,
}

/// Error object as reported by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderError {
    /// Human-readable description.
    #[serde(default)]
    pub message: String,

    /// Machine-readable category, e.g. `insufficient_quota`.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

/// Envelope of a non-2xx provider response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderErrorResponse {
    /// The error detail, when the body was JSON.
    #[serde(default)]
    pub error: Option<ProviderError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn request_serialization() {
        let request =
            ChatCompletionRequest::new("gpt-4o-mini", vec![RoleMessage::user("hi")], true);
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })
        );
    }

    #[test]
    fn chunk_delta_text() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
        }))
        .unwrap();
        assert_eq!(chunk.delta_text(), Some("Hel"));

        let role_only: ChatCompletionChunk = serde_json::from_value(json!({
            "choices": [{"index": 0, "delta": {"role": "assistant"}}]
        }))
        .unwrap();
        assert_eq!(role_only.delta_text(), None);

        let empty = ChatCompletionChunk::text("");
        assert_eq!(empty.delta_text(), None);

        let failed: ChatCompletionChunk = serde_json::from_value(json!({
            "error": {"message": "server overloaded", "type": "server_error"}
        }))
        .unwrap();
        assert_eq!(failed.delta_text(), None);
        assert_eq!(
            failed.error.map(|e| e.error_type),
            Some(Some("server_error".to_string()))
        );

        let finished: ChatCompletionChunk =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert_eq!(finished.delta_text(), None);
    }

    #[test]
    fn completion_text() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Salmon sizzles"}}]
        }))
        .unwrap();
        assert_eq!(completion.text(), "Salmon sizzles");
        assert_eq!(ChatCompletion::default().text(), "");
    }
}
