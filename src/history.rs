//! Conversion of the turn list into the upstream message list.

use crate::types::{ChatTurn, RoleMessage};

/// How many prior turns are forwarded upstream with each new message.
pub const HISTORY_TURNS: usize = 10;

/// Build the message list for a new user message.
///
/// Only the most recent [`HISTORY_TURNS`] turns are considered. Each turn
/// contributes its user side and its assistant side, skipping sides that are
/// blank, oldest first. `user_text` is always appended last.
pub fn build_messages(history: &[ChatTurn], user_text: &str) -> Vec<RoleMessage> {
    let start = history.len().saturating_sub(HISTORY_TURNS);
    let mut messages = Vec::with_capacity(2 * (history.len() - start) + 1);
    for turn in &history[start..] {
        if !turn.user.trim().is_empty() {
            messages.push(RoleMessage::user(turn.user.clone()));
        }
        if !turn.ai.trim().is_empty() {
            messages.push(RoleMessage::assistant(turn.ai.clone()));
        }
    }
    messages.push(RoleMessage::user(user_text));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn turns(n: usize) -> Vec<ChatTurn> {
        (0..n)
            .map(|i| ChatTurn {
                user: format!("question {i}"),
                ai: format!("answer {i}"),
            })
            .collect()
    }

    #[test]
    fn keeps_only_recent_turns() {
        let history = turns(12);
        let messages = build_messages(&history, "newest");
        assert_eq!(messages.len(), 21);
        assert_eq!(messages[0], RoleMessage::user("question 2"));
        assert_eq!(messages[19], RoleMessage::assistant("answer 11"));
        assert_eq!(messages[20], RoleMessage::user("newest"));
        assert!(
            !messages
                .iter()
                .any(|m| m.content == "question 0" || m.content == "answer 1")
        );
    }

    #[test]
    fn skips_blank_sides() {
        let history = vec![
            ChatTurn::greeting(),
            ChatTurn {
                user: "hi".to_string(),
                ai: "  ".to_string(),
            },
        ];
        let messages = build_messages(&history, "still there?");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::User]);
        assert_eq!(messages[0].content, crate::types::GREETING);
    }

    #[test]
    fn empty_history() {
        let messages = build_messages(&[], "first");
        assert_eq!(messages, vec![RoleMessage::user("first")]);
    }
}
