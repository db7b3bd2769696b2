//! Lifecycle tests for RemoteQueryView.
//!
//! All tests run on a paused clock: sleeps inside fetches and delayed
//! refetch timers advance only as far as the test awaits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use remote_query::tracer::{FetchCause, FetchOutcome, RequestId, Tracer, TracerQueryKey};
use remote_query::{Fetch, FetchError, QueryKey, QueryState, RemoteQueryView, ViewHandle};
use serde_json::{json, Value};
use tokio::time::sleep;

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fetch that counts its invocations and resolves to `result` after `latency`.
fn counted<T: Clone + Send + Sync + 'static>(
    calls: &Arc<AtomicUsize>,
    latency: Duration,
    result: Result<T, FetchError>,
) -> impl Fetch<T> {
    let calls = calls.clone();
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let result = result.clone();
        async move {
            sleep(latency).await;
            result
        }
    }
}

fn key(params: &str) -> QueryKey {
    QueryKey::new("test/items", "dev/instance", params.to_string())
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

// ============================================================================
// Memoization
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_same_key_fetches_once() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();

    let first = view.observe(key("a"), counted(&calls, ms(10), Ok(1)));
    let second = view.observe(key("a"), counted(&calls, ms(10), Ok(2)));

    assert!(first.is_loading());
    assert!(second.is_loading());
    assert_eq!(view.settled().await, QueryState::success(1));

    // Observing after settling reuses the result as well.
    assert_eq!(
        view.observe(key("a"), counted(&calls, ms(10), Ok(3))),
        QueryState::success(1)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_key_shows_loading_then_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();

    view.observe(key("a"), counted(&calls, ms(10), Ok(1)));
    assert_eq!(view.settled().await, QueryState::success(1));

    let state = view.observe(key("b"), counted(&calls, ms(10), Ok(2)));
    assert!(state.is_loading());
    assert!(view.snapshot().fetching);
    assert_eq!(view.settled().await, QueryState::success(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Last-key-wins
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_superseded_fetch_resolving_late_is_discarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<String>::new();

    view.observe(key("a"), counted(&calls, ms(200), Ok("a".to_string())));
    view.observe(key("b"), counted(&calls, ms(50), Ok("b".to_string())));

    assert_eq!(view.settled().await, QueryState::success("b".to_string()));

    sleep(ms(300)).await;
    assert_eq!(view.state(), QueryState::success("b".to_string()));
    assert!(!view.snapshot().fetching);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_fetch_resolving_early_is_discarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<String>::new();

    view.observe(key("a"), counted(&calls, ms(10), Ok("a".to_string())));
    view.observe(key("b"), counted(&calls, ms(100), Ok("b".to_string())));

    sleep(ms(20)).await;
    assert!(view.state().is_loading());
    assert!(view.snapshot().fetching);

    assert_eq!(view.settled().await, QueryState::success("b".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_superseded_rejection_is_discarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();

    view.observe(key("a"), counted(&calls, ms(200), Err(FetchError::api(400, "stale"))));
    view.observe(key("b"), counted(&calls, ms(50), Ok(2)));

    assert_eq!(view.settled().await, QueryState::success(2));

    sleep(ms(300)).await;
    assert_eq!(view.state(), QueryState::success(2));
    assert_eq!(view.state().error_message(), None);
}

#[tokio::test(start_paused = true)]
async fn test_only_latest_retry_applies() {
    let attempt = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<usize>::new();

    // Earlier attempts take longer, so they resolve after later ones.
    let counter = attempt.clone();
    view.observe(key("a"), move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            sleep(ms(400 / n as u64)).await;
            Ok::<_, FetchError>(n)
        }
    });
    view.retry();
    view.retry();

    assert_eq!(view.settled().await, QueryState::success(3));
    sleep(ms(500)).await;
    assert_eq!(view.state(), QueryState::success(3));
}

// ============================================================================
// Errors and retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_find_resolves_to_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<Vec<Value>>::new();
    let key = QueryKey::new("mongodb/query", "dev/mongodb", ("find", "{}", 50u32));

    view.observe(key, counted(&calls, ms(5), Ok(vec![json!({"_id": 1})])));

    assert_eq!(
        view.settled().await,
        QueryState::success(vec![json!({"_id": 1})])
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_error_with_soft_refresh() -> anyhow::Result<()> {
    let filter = Arc::new(Mutex::new("{bad".to_string()));
    let view = RemoteQueryView::<Vec<Value>>::new();

    let current = filter.clone();
    view.observe(key("{}"), move || {
        let filter = current.lock().clone();
        async move {
            sleep(ms(20)).await;
            if filter.starts_with("{bad") {
                Err(FetchError::api(400, "bad filter"))
            } else {
                Ok(vec![json!({"_id": 1})])
            }
        }
    });

    let state = view.settled().await;
    assert_eq!(state.error_message(), Some("bad filter"));

    *filter.lock() = "{}".to_string();
    view.retry();

    // The error stays displayed while the retry is in flight.
    let snapshot = view.snapshot();
    assert!(snapshot.fetching);
    assert_eq!(snapshot.state.error_message(), Some("bad filter"));

    let state = view.settled().await;
    assert_eq!(state.data().map(|d| d.len()), Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_errors_without_message_fall_back() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();

    view.observe(
        key("a"),
        counted(
            &calls,
            ms(1),
            Err(FetchError::Api {
                status: 500,
                message: None,
            }),
        ),
    );

    assert_eq!(
        view.settled().await.error_message(),
        Some(remote_query::UNKNOWN_ERROR_MESSAGE)
    );
}

// ============================================================================
// Delayed refetch
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_delayed_refetch_fires_after_delay() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();
    view.observe(key("a"), counted(&calls, ms(0), Ok(1)));
    view.settled().await;

    assert!(view.refetch_with_delay());
    assert!(view.has_pending_refetch());

    sleep(ms(2900)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sleep(ms(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!view.has_pending_refetch());
    assert_eq!(view.state(), QueryState::success(1));
}

#[tokio::test(start_paused = true)]
async fn test_delayed_refetches_do_not_stack() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();
    view.observe(key("a"), counted(&calls, ms(0), Ok(1)));
    view.settled().await;

    assert!(view.refetch_with_delay());
    sleep(ms(1000)).await;
    assert!(!view.refetch_with_delay());
    assert!(!view.handle().refetch_with_delay());

    sleep(ms(10_000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Once fired, a new timer can be armed.
    assert!(view.refetch_with_delay());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_before_delay_cancels_refetch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();
    view.observe(key("a"), counted(&calls, ms(0), Ok(1)));
    view.settled().await;

    assert!(view.refetch_with_delay());
    sleep(ms(1000)).await;
    drop(view);

    sleep(ms(10_000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_key_change_cancels_refetch() {
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();
    view.observe(key("a"), counted(&a_calls, ms(0), Ok(1)));
    view.settled().await;

    assert!(view.refetch_with_delay());
    sleep(ms(1000)).await;
    view.observe(key("b"), counted(&b_calls, ms(0), Ok(2)));
    assert!(!view.has_pending_refetch());

    sleep(ms(10_000)).await;
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(view.state(), QueryState::success(2));
}

#[tokio::test(start_paused = true)]
async fn test_configured_delay() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view: RemoteQueryView<u32> = RemoteQueryView::builder()
        .refetch_delay(ms(100))
        .build();
    view.observe(key("a"), counted(&calls, ms(0), Ok(1)));
    view.settled().await;

    assert!(view.refetch_with_delay());
    sleep(ms(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_in_flight_result_after_teardown_is_discarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();
    view.observe(key("a"), counted(&calls, ms(100), Ok(1)));

    view.teardown();
    assert!(!view.snapshot().fetching);

    sleep(ms(200)).await;
    assert!(view.state().is_loading());
    assert!(view.is_torn_down());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_transitions() {
    let calls = Arc::new(AtomicUsize::new(0));
    let view = RemoteQueryView::<u32>::new();
    let mut rx = view.subscribe();

    view.observe(key("a"), counted(&calls, ms(10), Ok(7)));
    {
        let snapshot = rx.borrow_and_update();
        assert!(snapshot.state.is_loading());
        assert!(snapshot.fetching);
    }

    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.state, QueryState::success(7));
    assert!(!snapshot.fetching);
}

// ============================================================================
// Tracers
// ============================================================================

/// Reports whether the view is alive from inside its own callbacks.
struct ReadsBack {
    handle: Mutex<Option<ViewHandle<u32>>>,
    seen: tokio::sync::mpsc::UnboundedSender<bool>,
}

impl ReadsBack {
    fn report(&self) {
        if let Some(handle) = self.handle.lock().as_ref() {
            let _ = self.seen.send(handle.is_alive());
        }
    }
}

impl Tracer for ReadsBack {
    fn on_fetch_start(&self, _request: RequestId, _key: &TracerQueryKey, _cause: FetchCause) {
        self.report();
    }

    fn on_fetch_settled(&self, _request: RequestId, _key: &TracerQueryKey, _outcome: FetchOutcome) {
        self.report();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tracer_may_read_the_view_back() {
    let (seen, mut reports) = tokio::sync::mpsc::unbounded_channel();
    let tracer = Arc::new(ReadsBack {
        handle: Mutex::new(None),
        seen,
    });
    let view = RemoteQueryView::<u32>::builder()
        .shared_tracer(tracer.clone())
        .build();
    *tracer.handle.lock() = Some(view.handle());

    view.observe(key("a"), || async { Ok::<_, FetchError>(1) });
    let settled = tokio::time::timeout(Duration::from_secs(2), view.settled()).await;
    assert_eq!(settled.ok(), Some(QueryState::success(1)));

    let mut alive = Vec::new();
    for _ in 0..2 {
        let report = tokio::time::timeout(Duration::from_secs(2), reports.recv()).await;
        alive.push(report.ok().flatten());
    }
    assert_eq!(alive, vec![Some(true), Some(true)]);
}
