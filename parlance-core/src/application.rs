//! Applications a conversation can run against
//!
//! The orchestrator only needs to know whether an application exists and is
//! ready to serve. Where that knowledge comes from is behind `ApplicationResolver`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use config::ApplicationSettings;

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub ready: bool,
}

impl Application {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            display_name: None,
            ready: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

impl From<&ApplicationSettings> for Application {
    fn from(settings: &ApplicationSettings) -> Self {
        Self {
            name: settings.name.clone(),
            namespace: settings.namespace.clone(),
            display_name: settings.display_name.clone(),
            ready: settings.ready,
        }
    }
}

#[async_trait]
pub trait ApplicationResolver: Send + Sync {
    /// Fails with `Error::ApplicationNotFound` for unknown applications
    async fn get_application(&self, name: &str, namespace: &str) -> Result<Application>;
}

/// Fixed set of applications, usually read from the settings file
#[derive(Clone, Debug, Default)]
pub struct StaticApplications {
    applications: HashMap<(String, String), Application>,
}

impl StaticApplications {
    pub fn new(applications: impl IntoIterator<Item = Application>) -> Self {
        Self {
            applications: applications
                .into_iter()
                .map(|app| ((app.namespace.clone(), app.name.clone()), app))
                .collect(),
        }
    }

    pub fn from_settings(settings: &[ApplicationSettings]) -> Self {
        Self::new(settings.iter().map(Application::from))
    }

    pub fn insert(&mut self, application: Application) {
        self.applications.insert(
            (application.namespace.clone(), application.name.clone()),
            application,
        );
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

#[async_trait]
impl ApplicationResolver for StaticApplications {
    async fn get_application(&self, name: &str, namespace: &str) -> Result<Application> {
        self.applications
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::application_not_found(namespace, name))
    }
}
