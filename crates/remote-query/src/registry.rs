//! Registry of dynamically loaded plugin modules.
//!
//! Plugin pages ship as separately built bundles that are fetched the first
//! time a page of the plugin is shown. The registry remembers, per module
//! name, whether the bundle is loading, loaded or failed. Concurrent load
//! requests for one module share a single in-flight load, and the outcome
//! (failure included) is kept for the lifetime of the registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::config::Settings;
use crate::error::ModuleError;

/// Where module bundles are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// Each module under `{base_url}/plugins/{name}/remoteEntry.js`.
    Production {
        /// Base URL of the hosting application, without trailing slash.
        base_url: String,
    },
    /// Every module from one development server URL.
    Development {
        /// Full URL of the bundle.
        url: String,
    },
}

impl ModuleSource {
    /// Bundle URL for module `name`.
    pub fn url(&self, name: &str) -> String {
        match self {
            ModuleSource::Production { base_url } => {
                format!("{}/plugins/{name}/remoteEntry.js", base_url.trim_end_matches('/'))
            }
            ModuleSource::Development { url } => url.clone(),
        }
    }
}

/// Load status of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// No load was requested.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// The bundle was loaded.
    Loaded,
    /// The load failed; the failure is remembered.
    Failed(ModuleError),
}

impl ModuleStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModuleStatus::Loaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModuleStatus::Failed(_))
    }
}

/// Fetches and installs a module bundle.
#[async_trait]
pub trait ModuleLoader: Send + Sync + 'static {
    /// Load module `name` from `url`.
    async fn load(&self, name: &str, url: &str) -> Result<(), ModuleError>;
}

/// Loader that downloads bundles over HTTP and accepts any non-empty 2xx body.
#[derive(Debug, Clone, Default)]
pub struct HttpModuleLoader {
    client: reqwest::Client,
}

impl HttpModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModuleLoader for HttpModuleLoader {
    async fn load(&self, name: &str, url: &str) -> Result<(), ModuleError> {
        let failed = |reason: String| ModuleError::LoadFailed {
            name: name.to_string(),
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| failed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("server responded with {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| failed(err.to_string()))?;
        if body.is_empty() {
            return Err(failed("empty bundle".to_string()));
        }
        Ok(())
    }
}

type LoadCell = Arc<tokio::sync::OnceCell<Result<(), ModuleError>>>;

/// Process-wide module registry.
pub struct ModuleRegistry {
    source: ModuleSource,
    loader: Arc<dyn ModuleLoader>,
    modules: Mutex<HashMap<String, LoadCell>>,
}

static GLOBAL: OnceCell<ModuleRegistry> = OnceCell::new();

impl ModuleRegistry {
    pub fn new(source: ModuleSource, loader: impl ModuleLoader) -> Self {
        Self {
            source,
            loader: Arc::new(loader),
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    ///
    /// Unless [`install_global`](Self::install_global) ran first, it is built
    /// from [`Settings::from_env`] with an [`HttpModuleLoader`].
    pub fn global() -> &'static ModuleRegistry {
        GLOBAL.get_or_init(|| {
            let settings = Settings::from_env().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "invalid environment, using default settings");
                Settings::default()
            });
            ModuleRegistry::new(settings.module_source(), HttpModuleLoader::new())
        })
    }

    /// Install the process-wide registry. Fails if it was already installed or used.
    pub fn install_global(registry: ModuleRegistry) -> Result<(), ModuleRegistry> {
        GLOBAL.set(registry)
    }

    pub fn source(&self) -> &ModuleSource {
        &self.source
    }

    /// Load module `name`, or wait for the load already in flight.
    ///
    /// An empty name does nothing and reports [`ModuleStatus::Unloaded`].
    /// Once a load finished, later calls return its outcome without loading
    /// again.
    pub async fn load(&self, name: &str) -> ModuleStatus {
        if name.is_empty() {
            return ModuleStatus::Unloaded;
        }

        let cell = self.modules.lock().entry(name.to_string()).or_default().clone();
        let outcome = cell
            .get_or_init(|| async {
                let url = self.source.url(name);
                tracing::debug!(module = name, %url, "loading module");
                let outcome = self.loader.load(name, &url).await;
                match &outcome {
                    Ok(()) => tracing::debug!(module = name, "module loaded"),
                    Err(err) => tracing::warn!(module = name, error = %err, "module failed to load"),
                }
                outcome
            })
            .await;

        match outcome {
            Ok(()) => ModuleStatus::Loaded,
            Err(err) => ModuleStatus::Failed(err.clone()),
        }
    }

    /// Current status of module `name` without triggering a load.
    pub fn status(&self, name: &str) -> ModuleStatus {
        let modules = self.modules.lock();
        match modules.get(name).map(|cell| cell.get()) {
            None => ModuleStatus::Unloaded,
            Some(None) => ModuleStatus::Loading,
            Some(Some(Ok(()))) => ModuleStatus::Loaded,
            Some(Some(Err(err))) => ModuleStatus::Failed(err.clone()),
        }
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("source", &self.source)
            .field("modules", &self.modules.lock().len())
            .finish_non_exhaustive()
    }
}
