//! Incident panel.
//!
//! Lists incidents matching a query inside a time range. Acknowledging or
//! closing an incident is applied by the incident service with a lag, so the
//! panel refetches through [`ViewHandle::refetch_with_delay`] after the action
//! was accepted.

use serde::{Deserialize, Serialize};

use crate::client::RestClient;
use crate::error::FetchError;
use crate::key::QueryKey;
use crate::state::{QueryState, Render};
use crate::times::TimeRange;
use crate::view::{RemoteQueryView, ViewHandle};

use super::PluginInstance;

pub const NAMESPACE: &str = "opsgenie/incidents";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    #[serde(default)]
    pub tiny_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Incident actions that need a delayed refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentAction {
    Acknowledge,
    Close,
    Resolve,
}

impl IncidentAction {
    fn path(self) -> &'static str {
        match self {
            IncidentAction::Acknowledge => "incident/acknowledge",
            IncidentAction::Close => "incident/close",
            IncidentAction::Resolve => "incident/resolve",
        }
    }
}

/// Add the time bounds to an incident query.
///
/// With an `interval` (seconds) the window ends at the end of `times` and
/// reaches back `interval` seconds; otherwise it is exactly `times`.
pub fn query_with_time(query: &str, times: &TimeRange, interval: Option<u64>) -> String {
    let start = match interval {
        Some(interval) => times
            .time_end
            .saturating_sub(i64::try_from(interval).unwrap_or(i64::MAX)),
        None => times.time_start,
    };
    let bounds = format!("createdAt >= {start} AND createdAt <= {}", times.time_end);
    let query = query.trim();
    if query.is_empty() {
        bounds
    } else {
        format!("{query} AND {bounds}")
    }
}

/// Parameters of an incident list; also the key parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncidentsQuery {
    pub query: String,
    pub interval: Option<u64>,
    pub times: TimeRange,
}

impl IncidentsQuery {
    pub fn key(&self, instance: &PluginInstance) -> QueryKey {
        QueryKey::new(NAMESPACE, instance.key_instance(), self.clone())
    }

    pub async fn run(
        &self,
        client: &RestClient,
        instance: &PluginInstance,
    ) -> Result<Vec<Incident>, FetchError> {
        let query = query_with_time(&self.query, &self.times, self.interval);
        client
            .get_json(&instance.api_path("incidents"), &[("query", query)])
            .await
    }
}

/// Incident panel of one plugin instance.
pub struct IncidentsPanel {
    instance: PluginInstance,
    client: RestClient,
    view: RemoteQueryView<Vec<Incident>>,
}

impl IncidentsPanel {
    pub fn new(
        instance: PluginInstance,
        client: RestClient,
        view: RemoteQueryView<Vec<Incident>>,
    ) -> Self {
        Self {
            instance,
            client,
            view,
        }
    }

    pub fn view(&self) -> &RemoteQueryView<Vec<Incident>> {
        &self.view
    }

    /// Observe `query`; fetches when the query, interval or range changed.
    pub fn show(&self, query: IncidentsQuery) -> QueryState<Vec<Incident>> {
        let key = query.key(&self.instance);
        let client = self.client.clone();
        let instance = self.instance.clone();
        self.view.observe(key, move || {
            let client = client.clone();
            let instance = instance.clone();
            let query = query.clone();
            async move { query.run(&client, &instance).await }
        })
    }

    /// Actions for the items of the list.
    pub fn actions(&self) -> IncidentActions {
        IncidentActions {
            instance: self.instance.clone(),
            client: self.client.clone(),
            refetch: self.view.handle(),
        }
    }
}

/// Item-level actions, holding only a weak handle to the panel's view.
#[derive(Clone)]
pub struct IncidentActions {
    instance: PluginInstance,
    client: RestClient,
    refetch: ViewHandle<Vec<Incident>>,
}

impl IncidentActions {
    /// Run `action` on `incident` and schedule a delayed refetch.
    ///
    /// Returns whether a new refetch was scheduled; `false` when one was
    /// already pending or the panel is gone.
    pub async fn run(&self, action: IncidentAction, incident: &Incident) -> Result<bool, FetchError> {
        self.client
            .post_action(
                &self.instance.api_path(action.path()),
                &[("id", incident.id.clone())],
            )
            .await?;
        tracing::debug!(incident = %incident.id, ?action, "incident action accepted");
        Ok(self.refetch.refetch_with_delay())
    }

    pub async fn acknowledge(&self, incident: &Incident) -> Result<bool, FetchError> {
        self.run(IncidentAction::Acknowledge, incident).await
    }
}

/// Renders the panel as lines of text; an empty list renders nothing.
#[derive(Debug, Default)]
pub struct IncidentLines;

impl Render<Vec<Incident>> for IncidentLines {
    type Output = Vec<String>;

    fn idle(&mut self) -> Vec<String> {
        Vec::new()
    }

    fn loading(&mut self) -> Vec<String> {
        vec!["Loading...".to_string()]
    }

    fn success(&mut self, incidents: &Vec<Incident>) -> Vec<String> {
        incidents
            .iter()
            .map(|incident| format!("[{}] {}", incident.status, incident.message))
            .collect()
    }

    fn error(&mut self, message: &str) -> Vec<String> {
        vec![
            "Could not get incidents".to_string(),
            message.to_string(),
            "Retry".to_string(),
        ]
    }

    fn empty(&mut self) -> Vec<String> {
        Vec::new()
    }

    fn is_empty(&self, incidents: &Vec<Incident>) -> bool {
        incidents.is_empty()
    }
}
