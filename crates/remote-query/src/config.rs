//! Runtime settings.
//!
//! [`Settings`] can be deserialized (every field has a default) and then
//! overridden from `REMOTE_QUERY_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::RestClient;
use crate::error::{ConfigError, FetchError, HistoryError};
use crate::history::{FileBackend, HistoryStore, MemoryBackend, DEFAULT_HISTORY_CAPACITY};
use crate::registry::ModuleSource;
use crate::view::{RemoteQueryViewBuilder, DEFAULT_REFETCH_DELAY};

pub const ENV_ENVIRONMENT: &str = "REMOTE_QUERY_ENV";
pub const ENV_API_BASE_URL: &str = "REMOTE_QUERY_API_BASE_URL";
pub const ENV_HISTORY_DIR: &str = "REMOTE_QUERY_HISTORY_DIR";
pub const ENV_HISTORY_CAPACITY: &str = "REMOTE_QUERY_HISTORY_CAPACITY";
pub const ENV_REFETCH_DELAY_MS: &str = "REMOTE_QUERY_REFETCH_DELAY_MS";
pub const ENV_DEV_MODULE_URL: &str = "REMOTE_QUERY_DEV_MODULE_URL";

/// Deployment environment; decides where plugin modules are loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    /// Base URL of the API and of production module bundles.
    pub api_base_url: String,
    /// Directory for file-backed history; in-memory when unset.
    pub history_dir: Option<PathBuf>,
    pub history_capacity: usize,
    pub refetch_delay_ms: u64,
    /// Bundle URL used for every module in development.
    pub dev_module_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            api_base_url: "http://localhost:15220".to_string(),
            history_dir: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            refetch_delay_ms: DEFAULT_REFETCH_DELAY.as_millis() as u64,
            dev_module_url: "http://localhost:3001/remoteEntry.js".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up through `lookup`. Empty values are ignored.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var(ENV_ENVIRONMENT) {
            self.environment = match value.trim().to_ascii_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                "development" | "dev" => Environment::Development,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_ENVIRONMENT,
                        value,
                        reason: "expected production or development",
                    })
                }
            };
        }
        if let Some(value) = var(ENV_API_BASE_URL) {
            self.api_base_url = value.trim().trim_end_matches('/').to_string();
        }
        if let Some(value) = var(ENV_HISTORY_DIR) {
            self.history_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = var(ENV_HISTORY_CAPACITY) {
            self.history_capacity = match value.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_HISTORY_CAPACITY,
                        value,
                        reason: "expected a positive integer",
                    })
                }
            };
        }
        if let Some(value) = var(ENV_REFETCH_DELAY_MS) {
            self.refetch_delay_ms =
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: ENV_REFETCH_DELAY_MS,
                        value: value.clone(),
                        reason: "expected milliseconds",
                    })?;
        }
        if let Some(value) = var(ENV_DEV_MODULE_URL) {
            self.dev_module_url = value.trim().to_string();
        }
        Ok(self)
    }

    pub fn refetch_delay(&self) -> Duration {
        Duration::from_millis(self.refetch_delay_ms)
    }

    pub fn module_source(&self) -> ModuleSource {
        match self.environment {
            Environment::Production => ModuleSource::Production {
                base_url: self.api_base_url.clone(),
            },
            Environment::Development => ModuleSource::Development {
                url: self.dev_module_url.clone(),
            },
        }
    }

    /// History store with the configured backend and capacity.
    pub fn history_store(&self) -> HistoryStore {
        match &self.history_dir {
            Some(dir) => HistoryStore::new(FileBackend::new(dir), self.history_capacity),
            None => HistoryStore::new(MemoryBackend::new(), self.history_capacity),
        }
    }

    /// Install [`history_store`](Self::history_store) as the process-wide store.
    pub fn install_history(&self) -> Result<(), HistoryError> {
        HistoryStore::install_global(self.history_store()).map_err(|_| HistoryError::AlreadyInstalled)
    }

    /// View builder using the configured refetch delay.
    pub fn view_builder<T: Send + Sync + 'static>(&self) -> RemoteQueryViewBuilder<T> {
        RemoteQueryViewBuilder::new().refetch_delay(self.refetch_delay())
    }

    pub fn rest_client(&self) -> Result<RestClient, FetchError> {
        RestClient::new(&self.api_base_url)
    }
}
