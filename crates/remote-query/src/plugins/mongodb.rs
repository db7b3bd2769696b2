//! Document database query page.
//!
//! A [`QueryPage`] turns the committed toolbar options into a [`MongoQuery`],
//! one variant per operation, and drives a view with it. Each variant has its
//! own request body and result decoding. A [`DocumentPage`] shows a single
//! document selected by a filter, without a toolbar.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::RestClient;
use crate::error::FetchError;
use crate::history::HistoryStore;
use crate::key::QueryKey;
use crate::operation::{OperationKind, QueryOptions};
use crate::state::{QueryState, Render};
use crate::times::TimeRange;
use crate::toolbar::Toolbar;
use crate::view::RemoteQueryView;

use super::PluginInstance;

/// Key namespace of document queries.
pub const NAMESPACE: &str = "mongodb/query";

/// A document query, resolved from [`QueryOptions`] for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MongoQuery {
    Find {
        collection: String,
        filter: String,
        sort: String,
        limit: u32,
    },
    Count {
        collection: String,
        filter: String,
    },
    FindOne {
        collection: String,
        filter: String,
    },
}

/// Result of a [`MongoQuery`], shaped by its operation.
#[derive(Debug, Clone, PartialEq)]
pub enum MongoResult {
    Documents(Vec<Value>),
    Count(u64),
    Document(Option<Value>),
}

impl MongoResult {
    /// No documents found. A count is never empty, zero is a result.
    pub fn is_empty(&self) -> bool {
        match self {
            MongoResult::Documents(documents) => documents.is_empty(),
            MongoResult::Count(_) => false,
            MongoResult::Document(document) => document.is_none(),
        }
    }
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

impl MongoQuery {
    /// Sort and limit are kept only for `find`, so editing them does not
    /// change the key of other operations.
    pub fn from_options(collection: &str, options: &QueryOptions) -> Self {
        let collection = collection.to_string();
        let filter = options.filter.clone();
        match options.operation {
            OperationKind::Find => MongoQuery::Find {
                collection,
                filter,
                sort: options.sort.clone(),
                limit: options.limit,
            },
            OperationKind::Count => MongoQuery::Count { collection, filter },
            OperationKind::FindOne => MongoQuery::FindOne { collection, filter },
        }
    }

    pub fn operation(&self) -> OperationKind {
        match self {
            MongoQuery::Find { .. } => OperationKind::Find,
            MongoQuery::Count { .. } => OperationKind::Count,
            MongoQuery::FindOne { .. } => OperationKind::FindOne,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            MongoQuery::Find { collection, .. }
            | MongoQuery::Count { collection, .. }
            | MongoQuery::FindOne { collection, .. } => collection,
        }
    }

    /// Endpoint path below the plugin instance.
    pub fn path(&self) -> String {
        format!("collections/{}", self.operation())
    }

    pub fn body(&self) -> Value {
        match self {
            MongoQuery::Find {
                filter,
                sort,
                limit,
                ..
            } => json!({ "filter": filter, "sort": sort, "limit": limit }),
            MongoQuery::Count { filter, .. } | MongoQuery::FindOne { filter, .. } => {
                json!({ "filter": filter })
            }
        }
    }

    /// Key of this query; the time range is part of it so a new range refetches.
    pub fn key(&self, instance: &PluginInstance, times: TimeRange) -> QueryKey {
        QueryKey::new(NAMESPACE, instance.key_instance(), (self.clone(), times))
    }

    /// Run the query against `instance`.
    pub async fn run(
        &self,
        client: &RestClient,
        instance: &PluginInstance,
    ) -> Result<MongoResult, FetchError> {
        let path = instance.api_path(&self.path());
        let query = [("collectionName", self.collection().to_string())];
        let body = self.body();
        match self {
            MongoQuery::Find { .. } => client
                .post_json::<_, Vec<Value>>(&path, &query, &body)
                .await
                .map(MongoResult::Documents),
            MongoQuery::Count { .. } => client
                .post_json::<_, CountResponse>(&path, &query, &body)
                .await
                .map(|response| MongoResult::Count(response.count)),
            MongoQuery::FindOne { .. } => client
                .post_json::<_, Option<Value>>(&path, &query, &body)
                .await
                .map(MongoResult::Document),
        }
    }
}

/// Query page of one collection.
pub struct QueryPage {
    instance: PluginInstance,
    collection: String,
    toolbar: Toolbar<QueryOptions>,
    times: TimeRange,
    view: RemoteQueryView<MongoResult>,
}

impl QueryPage {
    /// Page with default options over the last 15 minutes.
    pub fn new(
        instance: PluginInstance,
        collection: impl Into<String>,
        view: RemoteQueryView<MongoResult>,
    ) -> Self {
        Self {
            instance,
            collection: collection.into(),
            toolbar: Toolbar::new(QueryOptions::default()),
            times: TimeRange::last_15_minutes(),
            view,
        }
    }

    pub fn title(&self) -> String {
        collection_title(&self.instance, &self.collection)
    }

    pub fn subtitle(&self) -> String {
        self.instance.subtitle()
    }

    pub fn toolbar(&self) -> &Toolbar<QueryOptions> {
        &self.toolbar
    }

    pub fn toolbar_mut(&mut self) -> &mut Toolbar<QueryOptions> {
        &mut self.toolbar
    }

    pub fn set_times(&mut self, times: TimeRange) {
        self.times = times;
    }

    pub fn view(&self) -> &RemoteQueryView<MongoResult> {
        &self.view
    }

    /// The query of the committed options.
    pub fn current_query(&self) -> MongoQuery {
        MongoQuery::from_options(&self.collection, self.toolbar.committed())
    }

    /// Observe the committed options; fetches only if they changed.
    pub fn query(&self, client: &RestClient) -> QueryState<MongoResult> {
        let query = self.current_query();
        let key = query.key(&self.instance, self.times);
        let client = client.clone();
        let instance = self.instance.clone();
        self.view.observe(key, move || {
            let client = client.clone();
            let instance = instance.clone();
            let query = query.clone();
            async move { query.run(&client, &instance).await }
        })
    }

    /// Commit the toolbar, recording filter and sort history, and query.
    pub fn submit(&mut self, history: &HistoryStore, client: &RestClient) -> QueryState<MongoResult> {
        self.toolbar.commit_query(history);
        self.query(client)
    }
}

/// Single document page of one collection.
///
/// The filter comes from page state rather than a toolbar and defaults to
/// empty. The time range is fixed when the page is created.
pub struct DocumentPage {
    instance: PluginInstance,
    collection: String,
    filter: String,
    times: TimeRange,
    view: RemoteQueryView<MongoResult>,
}

impl DocumentPage {
    pub fn new(
        instance: PluginInstance,
        collection: impl Into<String>,
        view: RemoteQueryView<MongoResult>,
    ) -> Self {
        Self {
            instance,
            collection: collection.into(),
            filter: String::new(),
            times: TimeRange::last_15_minutes(),
            view,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn title(&self) -> String {
        collection_title(&self.instance, &self.collection)
    }

    pub fn subtitle(&self) -> String {
        self.instance.subtitle()
    }

    pub fn view(&self) -> &RemoteQueryView<MongoResult> {
        &self.view
    }

    pub fn current_query(&self) -> MongoQuery {
        MongoQuery::FindOne {
            collection: self.collection.clone(),
            filter: self.filter.clone(),
        }
    }

    /// Observe the document for the current filter.
    pub fn query(&self, client: &RestClient) -> QueryState<MongoResult> {
        let query = self.current_query();
        let key = query.key(&self.instance, self.times);
        let client = client.clone();
        let instance = self.instance.clone();
        self.view.observe(key, move || {
            let client = client.clone();
            let instance = instance.clone();
            let query = query.clone();
            async move { query.run(&client, &instance).await }
        })
    }
}

fn collection_title(instance: &PluginInstance, collection: &str) -> String {
    let collection = if collection.is_empty() {
        "Unknown Collection"
    } else {
        collection
    };
    format!("{}: {}", instance.name, collection)
}

/// Renders a result as a one-line summary.
#[derive(Debug, Default)]
pub struct Summary;

impl Render<MongoResult> for Summary {
    type Output = String;

    fn idle(&mut self) -> String {
        String::new()
    }

    fn loading(&mut self) -> String {
        "Loading...".to_string()
    }

    fn success(&mut self, data: &MongoResult) -> String {
        match data {
            MongoResult::Documents(documents) => format!("{} documents", documents.len()),
            MongoResult::Count(count) => format!("Count: {count}"),
            MongoResult::Document(Some(document)) => document.to_string(),
            MongoResult::Document(None) => "No document found".to_string(),
        }
    }

    fn error(&mut self, message: &str) -> String {
        format!("Could not get documents: {message}")
    }

    fn empty(&mut self) -> String {
        "No documents found".to_string()
    }

    fn is_empty(&self, data: &MongoResult) -> bool {
        data.is_empty()
    }
}
