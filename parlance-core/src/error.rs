//! Error types for parlance-core.

use thiserror::Error;

use crate::storage::ids::{ConversationId, MessageId};

/// Result type alias using parlance-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the chat orchestrator and storage backends.
#[derive(Error, Debug)]
pub enum Error {
    /// No conversation matched the id and scoping predicates
    #[error("conversation {0} is not found")]
    ConversationNotFound(ConversationId),

    /// No message matched within the scoped conversation
    #[error("message {message_id} in conversation {conversation_id} is not found")]
    MessageNotFound {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    #[error("application {namespace}/{name} is not found")]
    ApplicationNotFound { namespace: String, name: String },

    #[error("application {namespace}/{name} is not ready")]
    ApplicationNotReady { namespace: String, name: String },

    /// Required request fields are missing or inconsistent
    #[error("invalid request: {0}")]
    Validation(String),

    /// Storage backend failure (lock poisoning, corrupt rows, ...)
    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The application runner failed; the error is passed through untouched
    #[error("application run failed: {0}")]
    Runner(#[source] anyhow::Error),

    /// The caller cancelled the request or it timed out
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn application_not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ApplicationNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn application_not_ready(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ApplicationNotReady {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Conversation, message or application absent (or unready).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_)
                | Self::MessageNotFound { .. }
                | Self::ApplicationNotFound { .. }
                | Self::ApplicationNotReady { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::ConversationNotFound(ConversationId::from("c1")).is_not_found());
        assert!(Error::application_not_ready("ns", "app").is_not_found());
        assert!(!Error::storage("disk full").is_not_found());
        assert!(!Error::Cancelled.is_not_found());
        assert!(Error::validation("missing app name").is_validation());
    }

    #[test]
    fn test_messages() {
        let err = Error::application_not_found("kubeagi-system", "base-chat");
        assert_eq!(
            err.to_string(),
            "application kubeagi-system/base-chat is not found"
        );
        let err = Error::MessageNotFound {
            conversation_id: ConversationId::from("c1"),
            message_id: MessageId::from("m1"),
        };
        assert_eq!(err.to_string(), "message m1 in conversation c1 is not found");
    }
}
