//! Plugin pages end to end against a mock API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use remote_query::plugins::mongodb::{DocumentPage, MongoResult, QueryPage, Summary};
use remote_query::plugins::opsgenie::{query_with_time, IncidentLines, IncidentsPanel, IncidentsQuery};
use remote_query::tracer::{FetchCause, RequestId, Tracer, TracerQueryKey};
use remote_query::{
    HistoryStore, PluginInstance, QueryOptions, QueryState, RemoteQueryView, RestClient, TimeRange, Toolbar,
};
use serde_json::json;
use tokio::sync::Notify;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default)]
struct FetchStarts {
    count: AtomicUsize,
    delayed: Notify,
}

impl Tracer for FetchStarts {
    fn on_fetch_start(&self, _request: RequestId, _key: &TracerQueryKey, cause: FetchCause) {
        self.count.fetch_add(1, Ordering::SeqCst);
        if cause == FetchCause::DelayedRefetch {
            self.delayed.notify_one();
        }
    }
}

fn mongodb() -> PluginInstance {
    PluginInstance::new("mongodb", "mongodb", "dev-de1")
}

fn opsgenie() -> PluginInstance {
    PluginInstance::new("ops", "opsgenie", "hub")
}

// ============================================================================
// Document database
// ============================================================================

#[tokio::test]
async fn test_default_find_query() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let find = server.mock(|when, then| {
        when.method(POST)
            .path("/api/plugins/mongodb/mongodb/collections/find")
            .query_param("collectionName", "users")
            .json_body(json!({ "filter": "{}", "sort": "{\"_id\" : -1}", "limit": 50 }));
        then.status(200).json_body(json!([{ "_id": 1 }]));
    });

    let client = RestClient::new(&server.base_url())?;
    let page = QueryPage::new(mongodb(), "users", RemoteQueryView::new());
    assert_eq!(page.title(), "mongodb: users");

    assert!(page.query(&client).is_loading());
    let state = page.view().settled().await;

    find.assert();
    assert_eq!(
        state,
        QueryState::success(MongoResult::Documents(vec![json!({ "_id": 1 })]))
    );
    assert_eq!(page.view().render(&mut Summary), "1 documents");

    // Same committed options: no second request.
    page.query(&client);
    find.assert();
    Ok(())
}

#[tokio::test]
async fn test_submit_count_records_history() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let count = server.mock(|when, then| {
        when.method(POST)
            .path("/api/plugins/mongodb/mongodb/collections/count")
            .json_body(json!({ "filter": "{\"status\":\"open\"}" }));
        then.status(200).json_body(json!({ "count": 3 }));
    });

    let client = RestClient::new(&server.base_url())?;
    let history = HistoryStore::in_memory();
    let mut page = QueryPage::new(mongodb(), "users", RemoteQueryView::new());

    page.toolbar_mut().set_operation("count")?;
    page.toolbar_mut().set_filter(r#"{"status":"open"}"#);
    assert!(page.submit(&history, &client).is_loading());

    assert_eq!(
        page.view().settled().await,
        QueryState::success(MongoResult::Count(3))
    );
    count.assert();
    assert_eq!(
        history.list(&Toolbar::<QueryOptions>::filter_history_identifier())?,
        vec![r#"{"status":"open"}"#]
    );
    assert_eq!(
        history.list(&Toolbar::<QueryOptions>::sort_history_identifier())?,
        vec![r#"{"_id" : -1}"#]
    );
    Ok(())
}

#[tokio::test]
async fn test_bad_filter_then_retry() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mut failing = server.mock(|when, then| {
        when.method(POST)
            .path("/api/plugins/mongodb/mongodb/collections/findOne");
        then.status(400).json_body(json!({ "error": "bad filter" }));
    });

    let client = RestClient::new(&server.base_url())?;
    let mut page = QueryPage::new(mongodb(), "users", RemoteQueryView::new());
    page.toolbar_mut().set_operation("findOne")?;
    page.toolbar_mut().commit();

    page.query(&client);
    let state = page.view().settled().await;
    assert_eq!(state.error_message(), Some("bad filter"));
    assert!(page.view().render(&mut Summary).ends_with("bad filter"));

    failing.delete();
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/plugins/mongodb/mongodb/collections/findOne");
        then.status(200).json_body(json!({ "_id": 1, "name": "root" }));
    });

    page.view().retry();
    let state = page.view().settled().await;
    assert_eq!(
        state,
        QueryState::success(MongoResult::Document(Some(json!({ "_id": 1, "name": "root" }))))
    );
    Ok(())
}

#[tokio::test]
async fn test_document_page_finds_one() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let find_one = server.mock(|when, then| {
        when.method(POST)
            .path("/api/plugins/mongodb/mongodb/collections/findOne")
            .query_param("collectionName", "users")
            .json_body(json!({ "filter": "{\"_id\":7}" }));
        then.status(200).json_body(json!({ "_id": 7, "name": "ops" }));
    });

    let client = RestClient::new(&server.base_url())?;
    let page = DocumentPage::new(mongodb(), "users", RemoteQueryView::new()).with_filter(r#"{"_id":7}"#);
    assert_eq!(page.title(), "mongodb: users");
    assert_eq!(page.subtitle(), "(dev-de1 / mongodb)");

    assert!(page.query(&client).is_loading());
    assert_eq!(
        page.view().settled().await,
        QueryState::success(MongoResult::Document(Some(json!({ "_id": 7, "name": "ops" }))))
    );
    find_one.assert();
    Ok(())
}

// ============================================================================
// Incidents
// ============================================================================

#[tokio::test]
async fn test_incidents_and_acknowledge_refetch() -> anyhow::Result<()> {
    let times = TimeRange::custom(1_000, 1_900);
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/plugins/opsgenie/ops/incidents")
            .query_param("query", query_with_time("status: open", &times, None));
        then.status(200).json_body(json!([
            { "id": "1", "tinyId": "7", "message": "disk full", "status": "open" }
        ]));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/plugins/opsgenie/ops/incident/acknowledge")
            .query_param("id", "1");
        then.status(200).json_body(json!({}));
    });

    let starts = Arc::new(FetchStarts::default());
    let view = RemoteQueryView::builder()
        .refetch_delay(Duration::from_millis(50))
        .shared_tracer(starts.clone())
        .build();
    let panel = IncidentsPanel::new(opsgenie(), RestClient::new(&server.base_url())?, view);

    panel.show(IncidentsQuery {
        query: "status: open".to_string(),
        interval: None,
        times,
    });
    let state = panel.view().settled().await;
    let incidents = state.data().cloned().unwrap_or_default();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].tiny_id, "7");
    assert_eq!(panel.view().render(&mut IncidentLines), vec!["[open] disk full"]);

    let actions = panel.actions();
    assert!(actions.acknowledge(&incidents[0]).await?);
    assert!(!actions.acknowledge(&incidents[0]).await?);
    assert!(panel.view().has_pending_refetch());

    tokio::time::timeout(Duration::from_secs(5), starts.delayed.notified()).await?;
    panel.view().settled().await;

    assert_eq!(starts.count.load(Ordering::SeqCst), 2);
    assert!(!panel.view().has_pending_refetch());
    Ok(())
}

#[tokio::test]
async fn test_empty_incident_list_renders_nothing() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/api/plugins/opsgenie/ops/incidents");
        then.status(200).json_body(json!([]));
    });

    let panel = IncidentsPanel::new(
        opsgenie(),
        RestClient::new(&server.base_url())?,
        RemoteQueryView::new(),
    );
    panel.show(IncidentsQuery {
        query: String::new(),
        interval: Some(3600),
        times: TimeRange::last_15_minutes(),
    });

    assert!(panel.view().settled().await.is_terminal());
    assert!(panel.view().render(&mut IncidentLines).is_empty());
    Ok(())
}
