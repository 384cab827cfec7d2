//! In-memory conversation storage
//!
//! The fallback backend - fast but not persistent. Every operation holds the
//! map lock for its whole duration.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::search::{SearchOption, matches_all};
use crate::storage::traits::ConversationStore;
use crate::storage::types::{Conversation, Message, completed_answers, keep_completed_answers};

#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ConversationId, Conversation>>> {
        self.conversations
            .lock()
            .map_err(|_| Error::storage("memory store lock poisoned"))
    }

    /// Number of stored conversations
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn find_existing_conversation(
        &self,
        conversation_id: &ConversationId,
        options: &[SearchOption],
    ) -> Result<Conversation> {
        let conversations = self.lock()?;
        conversations
            .get(conversation_id)
            .filter(|c| matches_all(c, options))
            .cloned()
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.clone()))
    }

    async fn find_existing_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        options: &[SearchOption],
    ) -> Result<Message> {
        let conversations = self.lock()?;
        let conversation = conversations
            .get(conversation_id)
            .filter(|c| matches_all(c, options))
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.clone()))?;
        conversation
            .message(message_id)
            .cloned()
            .ok_or_else(|| Error::MessageNotFound {
                conversation_id: conversation_id.clone(),
                message_id: message_id.clone(),
            })
    }

    async fn list_conversations(&self, options: &[SearchOption]) -> Result<Vec<Conversation>> {
        let conversations = self.lock()?;
        let mut result: Vec<Conversation> = conversations
            .values()
            .filter(|c| matches_all(c, options))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut conversations = self.lock()?;
        let mut incoming = conversation.clone();
        // A conversation started again under the same id inherits nothing
        if let Some(stored) = conversations
            .get(&conversation.id)
            .filter(|c| c.started_at == conversation.started_at)
        {
            keep_completed_answers(&mut incoming.messages, &completed_answers(&stored.messages));
        }
        conversations.insert(incoming.id.clone(), incoming);
        Ok(())
    }

    async fn delete(&self, options: &[SearchOption]) -> Result<()> {
        let mut conversations = self.lock()?;
        conversations.retain(|_, c| !matches_all(c, options));
        Ok(())
    }
}
