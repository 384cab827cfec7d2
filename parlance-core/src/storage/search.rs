//! Scoping predicates for repository queries
//!
//! Every option narrows the result set; a slice of options is combined with AND.
//! An empty slice matches every conversation.

use crate::storage::ids::ConversationId;
use crate::storage::types::Conversation;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOption {
    ConversationId(ConversationId),
    AppName(String),
    AppNamespace(String),
    /// Owning user. `None` selects anonymous conversations only.
    User(Option<String>),
    Debug(bool),
}

impl SearchOption {
    pub fn conversation_id(id: impl Into<ConversationId>) -> Self {
        Self::ConversationId(id.into())
    }

    pub fn app_name(name: impl Into<String>) -> Self {
        Self::AppName(name.into())
    }

    pub fn app_namespace(namespace: impl Into<String>) -> Self {
        Self::AppNamespace(namespace.into())
    }

    pub fn user(user: Option<impl Into<String>>) -> Self {
        Self::User(user.map(Into::into))
    }

    pub fn debug(debug: bool) -> Self {
        Self::Debug(debug)
    }

    pub fn matches(&self, conversation: &Conversation) -> bool {
        match self {
            Self::ConversationId(id) => &conversation.id == id,
            Self::AppName(name) => &conversation.app_name == name,
            Self::AppNamespace(namespace) => &conversation.app_namespace == namespace,
            Self::User(user) => &conversation.user == user,
            Self::Debug(debug) => conversation.debug == *debug,
        }
    }
}

/// True when the conversation satisfies every option
pub fn matches_all(conversation: &Conversation, options: &[SearchOption]) -> bool {
    options.iter().all(|o| o.matches(conversation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(user: Option<&str>, debug: bool) -> Conversation {
        Conversation::new(
            ConversationId::from("c1"),
            "base-chat",
            "kubeagi-system",
            user.map(str::to_string),
            debug,
        )
    }

    #[test]
    fn test_options_combine_with_and() {
        let conv = conversation(Some("alice"), false);
        assert!(matches_all(
            &conv,
            &[
                SearchOption::app_name("base-chat"),
                SearchOption::app_namespace("kubeagi-system"),
                SearchOption::user(Some("alice")),
                SearchOption::debug(false),
            ]
        ));
        assert!(!matches_all(
            &conv,
            &[SearchOption::app_name("base-chat"), SearchOption::debug(true)]
        ));
        assert!(matches_all(&conv, &[]));
    }

    #[test]
    fn test_anonymous_user_scope() {
        let anonymous = conversation(None, false);
        let owned = conversation(Some("alice"), false);
        let scope = SearchOption::User(None);
        assert!(scope.matches(&anonymous));
        assert!(!scope.matches(&owned));
        assert!(!SearchOption::user(Some("bob")).matches(&owned));
    }

    #[test]
    fn test_conversation_id_option() {
        let conv = conversation(None, false);
        assert!(SearchOption::conversation_id("c1").matches(&conv));
        assert!(!SearchOption::conversation_id("c2").matches(&conv));
    }
}
