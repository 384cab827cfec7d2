//! Storage backend contract
//!
//! Every chat storage backend implements `ConversationStore`. Implementations
//! own their locking/transaction discipline and must be safe to call from
//! concurrent sessions.

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::search::SearchOption;
use crate::storage::types::{Conversation, Message};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Short backend name for logs ("memory", "sqlite")
    fn kind(&self) -> &'static str;

    /// The unique conversation with this id that also satisfies every option.
    ///
    /// Fails with `Error::ConversationNotFound` when nothing matches.
    async fn find_existing_conversation(
        &self,
        conversation_id: &ConversationId,
        options: &[SearchOption],
    ) -> Result<Conversation>;

    /// A single message inside a scoped conversation.
    ///
    /// Fails with `Error::ConversationNotFound` or `Error::MessageNotFound`.
    async fn find_existing_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        options: &[SearchOption],
    ) -> Result<Message>;

    /// All matching conversations, most recently updated first
    async fn list_conversations(&self, options: &[SearchOption]) -> Result<Vec<Conversation>>;

    /// Upsert by conversation id, atomically replacing messages and timestamps.
    ///
    /// A message answer that is already stored non-empty is kept as is.
    async fn update_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Remove every matching conversation. Matching nothing is not an error.
    async fn delete(&self, options: &[SearchOption]) -> Result<()>;
}
