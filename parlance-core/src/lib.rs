//! Conversation sessions for AI applications
//!
//! This crate provides:
//! - **Storage**: `ConversationStore` trait with `MemoryConversationStore` and
//!   `SqliteConversationStore` backends, and `StorageSelector` to pick one
//! - **Orchestration**: `ChatManager` runs chat turns against an `ApplicationRunner`
//! - **Collaborators**: `ApplicationResolver`, `DatasourceDiscovery`, `Caller`
//!
//! # Example
//!
//! ```ignore
//! use parlance_core::{ChatManager, ChatRequest, AppMetadata, StorageSelector, SettingsDiscovery};
//!
//! let selector = StorageSelector::new(Arc::new(SettingsDiscovery::new(settings.storage)));
//! let manager = ChatManager::new(selector, applications, runner);
//! let req = ChatRequest::new_chat(AppMetadata::new("base-chat", "default"), "hello");
//! let resp = manager.app_run(&caller, req, MessageId::new(), None, cancel).await?;
//! ```
pub mod application;
pub mod auth;
pub mod context;
pub mod error;
pub mod manager;
pub mod request;
pub mod runner;
pub mod storage;

pub use application::{Application, ApplicationResolver, StaticApplications};
pub use auth::Caller;
pub use context::{ChatHistory, ConversationContext, HistoryMessage, Role};
pub use error::{Error, Result};
pub use manager::ChatManager;
pub use request::{
    AppMetadata, ChatRequest, ChatResponse, ConversationRequest, MessageRequest, ResponseMode,
};
pub use runner::{ApplicationRunner, RunInput, RunOutput};
pub use storage::{
    Conversation, ConversationId, ConversationStore, DatasourceDiscovery, MemoryConversationStore,
    Message, MessageId, NoDatasource, Reference, SearchOption, SettingsDiscovery,
    SqliteConversationStore, StorageSelector,
};
pub use tokio_util::sync::CancellationToken;
