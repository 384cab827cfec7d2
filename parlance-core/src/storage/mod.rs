//! Chat storage
//!
//! Two interchangeable backends implement `ConversationStore`:
//!
//! - `SqliteConversationStore` - relational storage over SQLite
//! - `MemoryConversationStore` - in-process fallback, no persistence
//!
//! `StorageSelector` picks one of them once per process.

pub mod datasource;
pub mod ids;
mod memory;
mod search;
mod selector;
mod sqlite;
mod traits;
mod types;

pub use datasource::{
    ConnectionPool, DatasourceDiscovery, NoDatasource, RelationalDatasource, SettingsDiscovery,
    SqlitePool,
};
pub use ids::{ConversationId, MessageId};
pub use memory::MemoryConversationStore;
pub use search::{SearchOption, matches_all};
pub use selector::StorageSelector;
pub use sqlite::SqliteConversationStore;
pub use traits::ConversationStore;
pub use types::{Conversation, Message, Reference};
