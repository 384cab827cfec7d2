//! Application settings management

use crate::{DATABASE_DISABLED_ENV, DATABASE_PATH_ENV, PathManager};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default busy timeout for relational datasource connections.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_ready() -> bool {
    true
}

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Conversation storage configuration
    #[serde(default)]
    pub storage: StorageSettings,
    /// Applications that chat requests may target
    #[serde(default)]
    pub applications: Vec<ApplicationSettings>,
    /// Tracing filter directive (e.g. "info,parlance_core=debug"); RUST_LOG wins when set
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageSettings {
    /// Relational datasource for durable chat storage. Absent means in-memory storage.
    pub datasource: Option<DatasourceSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasourceSettings {
    /// Display name used in logs
    #[serde(default = "DatasourceSettings::default_name")]
    pub name: String,
    /// Database file path
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatasourceSettings {
    fn default_name() -> String {
        "default".to_string()
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: Self::default_name(),
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationSettings {
    pub name: String,
    pub namespace: String,
    pub display_name: Option<String>,
    /// Whether the application's ready condition is true
    #[serde(default = "default_ready")]
    pub ready: bool,
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found.
    /// Environment overrides are applied either way.
    pub fn load() -> Self {
        let settings = PathManager::settings_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default();
        settings.with_env_overrides()
    }

    /// Load settings from an explicit path, failing on a missing or malformed file
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("Failed to parse settings {}: {}", path.display(), e))
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }

    /// Apply `PARLANCE_DATABASE_PATH` / `PARLANCE_DATABASE_DISABLED` from the environment
    pub fn with_env_overrides(mut self) -> Self {
        let path = std::env::var(DATABASE_PATH_ENV).ok();
        let disabled = std::env::var(DATABASE_DISABLED_ENV)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        self.apply_overrides(path, disabled);
        self
    }

    pub fn apply_overrides(&mut self, database_path: Option<String>, database_disabled: bool) {
        if database_disabled {
            self.storage.datasource = None;
            return;
        }
        let Some(path) = database_path.filter(|p| !p.trim().is_empty()) else {
            return;
        };
        match self.storage.datasource.as_mut() {
            Some(ds) => ds.path = PathBuf::from(path),
            None => self.storage.datasource = Some(DatasourceSettings::new(path)),
        }
    }

    /// Find a configured application by name and namespace.
    pub fn application(&self, name: &str, namespace: &str) -> Option<&ApplicationSettings> {
        self.applications
            .iter()
            .find(|a| a.name == name && a.namespace == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_filter = "debug"

[storage.datasource]
path = "/var/lib/parlance/chat.db"

[[applications]]
name = "base-chat"
namespace = "kubeagi-system"

[[applications]]
name = "draft"
namespace = "team-a"
ready = false
"#;

    #[test]
    fn test_parse_settings() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();
        let ds = settings.storage.datasource.as_ref().unwrap();
        assert_eq!(ds.name, "default");
        assert_eq!(ds.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(settings.applications.len(), 2);
        assert!(settings.application("base-chat", "kubeagi-system").unwrap().ready);
        assert!(!settings.application("draft", "team-a").unwrap().ready);
        assert!(settings.application("draft", "other").is_none());
    }

    #[test]
    fn test_empty_settings_have_no_datasource() {
        let settings: Settings = toml::from_str("").unwrap();
        assert!(settings.storage.datasource.is_none());
        assert!(settings.applications.is_empty());
    }

    #[test]
    fn test_env_path_override() {
        let mut settings = Settings::default();
        settings.apply_overrides(Some("/tmp/chat.db".to_string()), false);
        assert_eq!(
            settings.storage.datasource.unwrap().path,
            PathBuf::from("/tmp/chat.db")
        );

        let mut settings: Settings = toml::from_str(SAMPLE).unwrap();
        settings.apply_overrides(Some("/tmp/other.db".to_string()), false);
        let ds = settings.storage.datasource.unwrap();
        assert_eq!(ds.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(ds.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_disable_override_wins() {
        let mut settings: Settings = toml::from_str(SAMPLE).unwrap();
        settings.apply_overrides(Some("/tmp/chat.db".to_string()), true);
        assert!(settings.storage.datasource.is_none());
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings: Settings = toml::from_str(SAMPLE).unwrap();

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.contains("Failed to read settings"));
    }
}
