use serde::{Deserialize, Serialize};

/// The assistant's opening line, shown before the user has said anything.
pub const GREETING: &str = "How can I help you today?";

/// One exchange: a user message paired with the assistant's reply.
///
/// `ai` is empty until the relay streams into it; once the stream ends the turn
/// is never touched again.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    /// What the user typed.
    pub user: String,

    /// What the assistant replied (possibly still accumulating).
    pub ai: String,
}

impl ChatTurn {
    /// Create a turn for freshly submitted user text with an empty reply.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ai: String::new(),
        }
    }

    /// The assistant-only turn that opens a conversation.
    pub fn greeting() -> Self {
        Self {
            user: String::new(),
            ai: GREETING.to_string(),
        }
    }

    /// True when the assistant has not produced any text yet.
    pub fn is_pending(&self) -> bool {
        self.ai.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn chat_turn_serialization() {
        let turn = ChatTurn {
            user: "hi".to_string(),
            ai: "hello".to_string(),
        };
        assert_eq!(to_value(&turn).unwrap(), json!({"user": "hi", "ai": "hello"}));
    }

    #[test]
    fn new_turn_is_pending() {
        let turn = ChatTurn::new("question");
        assert!(turn.is_pending());
        assert!(!ChatTurn::greeting().is_pending());
        assert!(ChatTurn::greeting().user.is_empty());
    }
}
