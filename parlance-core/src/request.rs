//! Chat request and response shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage::{ConversationId, MessageId, Reference};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Blocking,
    Streaming,
}

impl ResponseMode {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ResponseMode::Streaming)
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Blocking => f.write_str("blocking"),
            ResponseMode::Streaming => f.write_str("streaming"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(ResponseMode::Blocking),
            "streaming" => Ok(ResponseMode::Streaming),
            other => Err(Error::validation(format!("unknown response mode {:?}", other))),
        }
    }
}

/// Identity of the application a request targets
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub app_name: String,
    pub app_namespace: String,
}

impl AppMetadata {
    pub fn new(app_name: impl Into<String>, app_namespace: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_namespace: app_namespace.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(Error::validation("app name is required"));
        }
        if self.app_namespace.trim().is_empty() {
            return Err(Error::validation("app namespace is required"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    #[serde(flatten)]
    pub app: AppMetadata,
    pub conversation_id: ConversationId,
}

impl ConversationRequest {
    pub fn new(app: AppMetadata, conversation_id: impl Into<ConversationId>) -> Self {
        Self {
            app,
            conversation_id: conversation_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.app.validate()?;
        if self.conversation_id.is_empty() {
            return Err(Error::validation("conversation id is required"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    #[serde(flatten)]
    pub conversation: ConversationRequest,
    pub message_id: MessageId,
}

impl MessageRequest {
    pub fn new(conversation: ConversationRequest, message_id: impl Into<MessageId>) -> Self {
        Self {
            conversation,
            message_id: message_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.conversation.validate()?;
        if self.message_id.is_empty() {
            return Err(Error::validation("message id is required"));
        }
        Ok(())
    }
}

/// One chat turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(flatten)]
    pub app: AppMetadata,
    /// May be empty for a new chat; one is generated then
    #[serde(default = "empty_conversation_id")]
    pub conversation_id: ConversationId,
    pub query: String,
    #[serde(default)]
    pub new_chat: bool,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default)]
    pub debug: bool,
}

fn empty_conversation_id() -> ConversationId {
    ConversationId::from_string("")
}

impl ChatRequest {
    /// A request that starts a new conversation
    pub fn new_chat(app: AppMetadata, query: impl Into<String>) -> Self {
        Self {
            app,
            conversation_id: empty_conversation_id(),
            query: query.into(),
            new_chat: true,
            response_mode: ResponseMode::Blocking,
            debug: false,
        }
    }

    /// A request that continues an existing conversation
    pub fn continue_chat(
        app: AppMetadata,
        conversation_id: impl Into<ConversationId>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            new_chat: false,
            ..Self::new_chat(app, query)
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.app.validate()?;
        if self.query.trim().is_empty() {
            return Err(Error::validation("query is required"));
        }
        if !self.new_chat && self.conversation_id.is_empty() {
            return Err(Error::validation(
                "conversation id is required to continue a chat",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    /// Final answer text
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub references: Vec<Reference>,
}
