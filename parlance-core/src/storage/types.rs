//! Conversation data model
//!
//! - `Conversation` - scoped, ordered session of exchanges with one application
//! - `Message` - one query/answer exchange
//! - `Reference` - a citation attached to an answer on completion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::context::ChatHistory;
use crate::storage::ids::{ConversationId, MessageId};

// ============================================================================
// Reference
// ============================================================================

/// A source cited by the pipeline for an answer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub qa_file_path: String,
    #[serde(default)]
    pub qa_line_number: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

// ============================================================================
// Message
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub query: String,
    /// Empty while the pipeline runs, or if it failed before completing
    pub answer: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Message {
    /// A message that has been asked but not answered yet
    pub fn new(id: MessageId, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            answer: String::new(),
            references: Vec::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.answer.is_empty()
    }

    /// Record the pipeline result. Returns false (and changes nothing) if the
    /// message already carries an answer.
    pub fn complete(&mut self, answer: impl Into<String>, references: Vec<Reference>) -> bool {
        if self.is_answered() {
            return false;
        }
        self.answer = answer.into();
        self.references = references;
        true
    }
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub app_name: String,
    pub app_namespace: String,
    /// Owning user; `None` for anonymous conversations
    pub user: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub debug: bool,
    /// Chronological, append-only
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Start an empty conversation stamped with the current time
    pub fn new(
        id: ConversationId,
        app_name: impl Into<String>,
        app_namespace: impl Into<String>,
        user: Option<String>,
        debug: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            app_name: app_name.into(),
            app_namespace: app_namespace.into(),
            user,
            started_at: now,
            updated_at: now,
            debug,
            messages: Vec::new(),
        }
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn contains_message(&self, id: &MessageId) -> bool {
        self.message(id).is_some()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last_message_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }

    /// Replay every message as a user turn followed by an assistant turn
    pub fn replay_history(&self) -> ChatHistory {
        let mut history = ChatHistory::new();
        for message in &self.messages {
            history.add_user_message(message.query.clone());
            history.add_ai_message(message.answer.clone());
        }
        history
    }
}

/// Answers already persisted for a conversation, keyed by message id.
/// Each entry carries the query the answer belongs to.
pub(crate) type CompletedAnswers = HashMap<MessageId, (String, String, Vec<Reference>)>;

pub(crate) fn completed_answers(messages: &[Message]) -> CompletedAnswers {
    messages
        .iter()
        .filter(|m| m.is_answered())
        .map(|m| {
            (
                m.id.clone(),
                (m.query.clone(), m.answer.clone(), m.references.clone()),
            )
        })
        .collect()
}

/// A stored non-empty answer is never replaced by a later write of the same
/// message. A reused message id with a different query is a different message.
pub(crate) fn keep_completed_answers(messages: &mut [Message], completed: &CompletedAnswers) {
    for message in messages.iter_mut() {
        if let Some((query, answer, references)) = completed.get(&message.id) {
            if message.query == *query && message.answer != *answer {
                message.answer = answer.clone();
                message.references = references.clone();
            }
        }
    }
}
