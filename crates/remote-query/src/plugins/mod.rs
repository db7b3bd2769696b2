//! Plugin pages built on [`RemoteQueryView`](crate::RemoteQueryView).

use serde::{Deserialize, Serialize};

pub mod mongodb;
pub mod opsgenie;

/// A configured instance of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginInstance {
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub cluster: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PluginInstance {
    pub fn new(
        name: impl Into<String>,
        plugin_type: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            plugin_type: plugin_type.into(),
            cluster: cluster.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// API path of `path` under this instance: `/api/plugins/<type>/<name>/<path>`.
    pub fn api_path(&self, path: &str) -> String {
        format!(
            "/api/plugins/{}/{}/{}",
            self.plugin_type,
            self.name,
            path.trim_start_matches('/')
        )
    }

    /// Page subtitle, `(<cluster> / <type>)`.
    pub fn subtitle(&self) -> String {
        format!("({} / {})", self.cluster, self.plugin_type)
    }

    /// The instance description, or `fallback`.
    pub fn description_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.description.as_deref().unwrap_or(fallback)
    }

    /// Instance part of query keys.
    pub(crate) fn key_instance(&self) -> String {
        format!("{}/{}", self.cluster, self.name)
    }
}
