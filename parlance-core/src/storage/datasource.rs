//! Relational datasource discovery
//!
//! The storage selector asks a `DatasourceDiscovery` whether a relational
//! datasource is configured and, if so, for a connection pool to it.

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config::{DatasourceSettings, StorageSettings};

/// A configured relational datasource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationalDatasource {
    pub name: String,
    pub path: PathBuf,
    pub busy_timeout: Duration,
}

impl From<&DatasourceSettings> for RelationalDatasource {
    fn from(settings: &DatasourceSettings) -> Self {
        Self {
            name: settings.name.clone(),
            path: settings.path.clone(),
            busy_timeout: Duration::from_millis(settings.busy_timeout_ms),
        }
    }
}

/// Hands out connections to a relational datasource
pub trait ConnectionPool: Send + Sync {
    fn acquire(&self) -> anyhow::Result<Connection>;
}

#[async_trait]
pub trait DatasourceDiscovery: Send + Sync {
    /// `Ok(None)` when no relational datasource is configured
    async fn relational_datasource(&self) -> anyhow::Result<Option<RelationalDatasource>>;

    async fn connection_pool(
        &self,
        datasource: &RelationalDatasource,
    ) -> anyhow::Result<Arc<dyn ConnectionPool>>;
}

/// Opens SQLite connections for one database file
#[derive(Debug)]
pub struct SqlitePool {
    datasource: RelationalDatasource,
}

impl SqlitePool {
    /// Create the database directory if needed
    pub fn new(datasource: RelationalDatasource) -> anyhow::Result<Self> {
        if let Some(parent) = datasource.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create datasource directory {}", parent.display())
                })?;
            }
        }
        Ok(Self { datasource })
    }

    pub fn datasource(&self) -> &RelationalDatasource {
        &self.datasource
    }
}

impl ConnectionPool for SqlitePool {
    fn acquire(&self) -> anyhow::Result<Connection> {
        let conn = Connection::open(&self.datasource.path).with_context(|| {
            format!(
                "failed to open datasource {} at {}",
                self.datasource.name,
                self.datasource.path.display()
            )
        })?;
        conn.busy_timeout(self.datasource.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

/// Discovery driven by the `[storage]` section of the settings file
#[derive(Clone, Debug, Default)]
pub struct SettingsDiscovery {
    settings: StorageSettings,
}

impl SettingsDiscovery {
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DatasourceDiscovery for SettingsDiscovery {
    async fn relational_datasource(&self) -> anyhow::Result<Option<RelationalDatasource>> {
        Ok(self.settings.datasource.as_ref().map(RelationalDatasource::from))
    }

    async fn connection_pool(
        &self,
        datasource: &RelationalDatasource,
    ) -> anyhow::Result<Arc<dyn ConnectionPool>> {
        Ok(Arc::new(SqlitePool::new(datasource.clone())?))
    }
}

/// Discovery for deployments without a relational datasource
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDatasource;

#[async_trait]
impl DatasourceDiscovery for NoDatasource {
    async fn relational_datasource(&self) -> anyhow::Result<Option<RelationalDatasource>> {
        Ok(None)
    }

    async fn connection_pool(
        &self,
        datasource: &RelationalDatasource,
    ) -> anyhow::Result<Arc<dyn ConnectionPool>> {
        anyhow::bail!("no connection pool for datasource {}", datasource.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settings_without_datasource() {
        let discovery = SettingsDiscovery::default();
        assert!(discovery.relational_datasource().await.unwrap().is_none());
        assert!(NoDatasource.relational_datasource().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pool_creates_directory_and_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");
        let discovery = SettingsDiscovery::new(StorageSettings {
            datasource: Some(DatasourceSettings::new(&path)),
        });

        let datasource = discovery.relational_datasource().await.unwrap().unwrap();
        assert_eq!(datasource.path, path);
        assert_eq!(datasource.busy_timeout, Duration::from_millis(5_000));

        let pool = discovery.connection_pool(&datasource).await.unwrap();
        let conn = pool.acquire().unwrap();
        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
        assert!(path.exists());
    }

    #[test]
    fn test_pool_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = SqlitePool::new(RelationalDatasource {
            name: "broken".to_string(),
            path: blocker.join("chat.db"),
            busy_timeout: Duration::from_millis(10),
        });
        assert!(result.is_err());
    }
}
