//! Conversation history handed to the application runner
//!
//! `ConversationContext` is a read-only view of prior exchanges. `ChatHistory`
//! is the in-memory implementation the orchestrator builds by replaying the
//! stored messages of a conversation (query, then answer, per message).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Read-only view of conversation messages
///
/// Synchronous on purpose: history is fully loaded before the runner starts.
pub trait ConversationContext {
    fn iter(&self) -> impl Iterator<Item = &HistoryMessage>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered chat memory consumed by the application pipeline
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<HistoryMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(HistoryMessage::user(content));
    }

    pub fn add_ai_message(&mut self, content: impl Into<String>) {
        self.messages.push(HistoryMessage::assistant(content));
    }

    pub fn messages(&self) -> &[HistoryMessage] {
        &self.messages
    }

    /// Consecutive (query, answer) pairs. A trailing unmatched user message is skipped.
    pub fn exchanges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.messages.chunks(2).filter_map(|pair| match pair {
            [q, a] if q.role == Role::User && a.role == Role::Assistant => {
                Some((q.content.as_str(), a.content.as_str()))
            }
            _ => None,
        })
    }
}

impl ConversationContext for ChatHistory {
    fn iter(&self) -> impl Iterator<Item = &HistoryMessage> {
        self.messages.iter()
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_insertion_order() {
        let mut history = ChatHistory::new();
        history.add_user_message("q1");
        history.add_ai_message("a1");
        history.add_user_message("q2");
        history.add_ai_message("");

        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        let pairs: Vec<_> = history.exchanges().collect();
        assert_eq!(pairs, vec![("q1", "a1"), ("q2", "")]);
    }

    #[test]
    fn test_empty_history() {
        let history = ChatHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.exchanges().count(), 0);
    }
}
