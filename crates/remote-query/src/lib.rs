//! Remote-query: lifecycle management for remote data shown in plugin pages.
//!
//! Every plugin page of the dashboard follows the same pattern: derive a key
//! from the plugin instance and the query parameters, fetch JSON from a REST
//! endpoint, and render one of idle, loading, success, empty or error. This
//! crate implements that pattern once.
//!
//! # Key Features
//!
//! - **Keyed fetching**: [`RemoteQueryView::observe`] fetches only when the key changes
//! - **Last-key-wins**: results of superseded fetches never overwrite newer state
//! - **Soft refresh**: [`RemoteQueryView::retry`] keeps the displayed result while refetching
//! - **Delayed refetch**: one coalesced timer for actions the backend applies with a lag
//! - **History**: most-recent-first, front-deduplicated field history ([`HistoryStore`])
//! - **Module registry**: idempotent loading of plugin bundles ([`ModuleRegistry`])
//! - **Observability**: the [`tracer`] module reports every lifecycle event
//!
//! # Example
//!
//! ```ignore
//! use remote_query::{FetchError, QueryKey, RemoteQueryView};
//!
//! let view = RemoteQueryView::<Vec<String>>::new();
//! let key = QueryKey::new("mongodb/collections", "dev/mongodb", ());
//! view.observe(key, || async { Ok::<_, FetchError>(vec!["users".to_string()]) });
//!
//! let state = view.settled().await;
//! assert_eq!(state.data().map(|d| d.len()), Some(1));
//! ```
//!
//! Views spawn their fetches and timers on the ambient Tokio runtime.

pub mod client;
pub mod config;
mod error;
mod fetch;
pub mod history;
mod key;
pub mod operation;
pub mod plugins;
pub mod registry;
mod state;
pub mod times;
pub mod toolbar;
pub mod tracer;
mod view;

pub use client::RestClient;
pub use config::{Environment, Settings};
pub use error::{
    ConfigError, FetchError, HistoryError, ModuleError, ToolbarError, UNKNOWN_ERROR_MESSAGE,
};
pub use fetch::Fetch;
pub use history::{history_identifier, FileBackend, HistoryBackend, HistoryStore, MemoryBackend};
pub use key::{QueryKey, QueryParams};
pub use operation::{OperationKind, QueryOptions};
pub use plugins::PluginInstance;
pub use registry::{HttpModuleLoader, ModuleLoader, ModuleRegistry, ModuleSource, ModuleStatus};
pub use state::{QueryState, Render, Snapshot};
pub use times::{RelativeTime, TimeRange};
pub use toolbar::{toggle_selection, Toolbar};
pub use tracer::{LogTracer, NoopTracer, Tracer, TracerQueryKey};
pub use view::{RemoteQueryView, RemoteQueryViewBuilder, ViewHandle, DEFAULT_REFETCH_DELAY};
