use serde::{Deserialize, Serialize};

/// Who authored a message in the upstream conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

/// A single role/content pair, the wire format of the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleMessage {
    /// The role of the message.
    pub role: Role,

    /// The text of the message.
    pub content: String,
}

impl RoleMessage {
    /// Create a new `RoleMessage`.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// True when the content is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn role_message_serialization() {
        let message = RoleMessage::assistant("Hello!");
        assert_eq!(
            to_value(&message).unwrap(),
            json!({"role": "assistant", "content": "Hello!"})
        );
    }

    #[test]
    fn role_message_rejects_unknown_role() {
        let result = serde_json::from_value::<RoleMessage>(json!({
            "role": "wizard",
            "content": "abracadabra"
        }));
        assert!(result.is_err());
    }
}
