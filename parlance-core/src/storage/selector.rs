//! One-shot chat storage selection
//!
//! The first caller probes for a relational datasource; everyone else waits
//! for that probe and shares its result. Any failure along the way falls back
//! to the in-memory store. The choice is never revisited.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::storage::datasource::DatasourceDiscovery;
use crate::storage::memory::MemoryConversationStore;
use crate::storage::sqlite::SqliteConversationStore;
use crate::storage::traits::ConversationStore;

pub struct StorageSelector {
    discovery: Arc<dyn DatasourceDiscovery>,
    store: OnceCell<Arc<dyn ConversationStore>>,
}

impl StorageSelector {
    pub fn new(discovery: Arc<dyn DatasourceDiscovery>) -> Self {
        Self {
            discovery,
            store: OnceCell::new(),
        }
    }

    /// A selector whose choice is already made
    pub fn with_store(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            discovery: Arc::new(crate::storage::datasource::NoDatasource),
            store: OnceCell::new_with(Some(store)),
        }
    }

    /// The selected backend, probing on first use
    pub async fn storage(&self) -> Arc<dyn ConversationStore> {
        self.store.get_or_init(|| self.select()).await.clone()
    }

    /// The backend if selection already happened
    pub fn selected(&self) -> Option<Arc<dyn ConversationStore>> {
        self.store.get().cloned()
    }

    async fn select(&self) -> Arc<dyn ConversationStore> {
        match self.probe().await {
            Some(store) => {
                info!(kind = store.kind(), "use sqlite as chat storage");
                store
            }
            None => {
                info!("use memory as chat storage");
                Arc::new(MemoryConversationStore::new())
            }
        }
    }

    async fn probe(&self) -> Option<Arc<dyn ConversationStore>> {
        let datasource = match self.discovery.relational_datasource().await {
            Ok(Some(datasource)) => datasource,
            Ok(None) => {
                info!("no relational datasource configured");
                return None;
            }
            Err(e) => {
                info!(error = %e, "failed to discover relational datasource");
                return None;
            }
        };

        let pool = match self.discovery.connection_pool(&datasource).await {
            Ok(pool) => pool,
            Err(e) => {
                error!(datasource = %datasource.name, error = %e, "failed to get connection pool");
                return None;
            }
        };

        let conn = match pool.acquire() {
            Ok(conn) => conn,
            Err(e) => {
                error!(datasource = %datasource.name, error = %e, "failed to acquire connection");
                return None;
            }
        };

        match SqliteConversationStore::new(conn) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                error!(datasource = %datasource.name, error = %e, "failed to initialize chat schema");
                None
            }
        }
    }
}
