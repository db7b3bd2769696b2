//! The remote query view: one key, one fetch, one lifecycle.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::FetchError;
use crate::fetch::Fetch;
use crate::key::QueryKey;
use crate::state::{QueryState, Render, Snapshot};
use crate::tracer::{
    DiscardReason, FetchCause, FetchOutcome, LogTracer, RequestId, Tracer, TracerQueryKey,
};

/// Delay used by [`RemoteQueryView::refetch_with_delay`] unless configured otherwise.
pub const DEFAULT_REFETCH_DELAY: Duration = Duration::from_millis(3000);

/// Manages the lifecycle of a single remote query.
///
/// A view is driven by [`observe`](Self::observe): the first observation and
/// every change of key start a fetch and show [`QueryState::Loading`];
/// observing an unchanged key returns the current state without fetching.
/// [`retry`](Self::retry) refetches the current key while the previous
/// result stays displayed, and [`refetch_with_delay`](Self::refetch_with_delay)
/// arms a single timer for actions whose effect the backend applies
/// eventually.
///
/// Results are applied last-key-wins: each fetch is tagged with the key and
/// a request id, and only the latest request for the current key may change
/// the state. Dropping the view tears it down, which aborts the pending timer
/// and discards whatever is still in flight.
///
/// # Example
///
/// ```ignore
/// let view = RemoteQueryView::<Vec<Incident>>::new();
/// let state = view.observe(key, move || fetch_incidents(client.clone(), query.clone()));
/// assert!(state.is_loading());
///
/// let state = view.settled().await;
/// ```
///
/// # Panics
///
/// Fetches and timers are spawned on the current Tokio runtime, so
/// `observe`, `retry` and `refetch_with_delay` panic when called outside of
/// one.
pub struct RemoteQueryView<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    snapshots: watch::Sender<Snapshot<T>>,
    refetch_delay: Duration,
    tracer: Arc<dyn Tracer>,
}

struct Inner<T> {
    key: Option<QueryKey>,
    traced_key: Option<TracerQueryKey>,
    fetch: Option<Arc<dyn Fetch<T>>>,
    state: QueryState<T>,
    /// Latest issued request; `Some` while it is in flight.
    latest: Option<RequestId>,
    delayed: Option<DelayedRefetch>,
    next_timer: u64,
    torn_down: bool,
}

struct DelayedRefetch {
    id: u64,
    handle: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> Default for RemoteQueryView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> RemoteQueryView<T> {
    /// Create a view with the default refetch delay that logs through `tracing`.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for customizing the view.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use remote_query::{tracer::NoopTracer, RemoteQueryView};
    ///
    /// let view: RemoteQueryView<u32> = RemoteQueryView::builder()
    ///     .refetch_delay(Duration::from_secs(1))
    ///     .tracer(NoopTracer)
    ///     .build();
    /// assert!(view.state().is_idle());
    /// ```
    pub fn builder() -> RemoteQueryViewBuilder<T> {
        RemoteQueryViewBuilder::new()
    }

    /// Observe `key`, fetching with `fetch` when the key is new.
    ///
    /// Returns the state after the observation: `Loading` when a fetch was
    /// started for a new key, otherwise the current state. The `fetch` passed
    /// along with an unchanged key is dropped; the one stored with the key is
    /// reused by retries.
    pub fn observe<F: Fetch<T>>(&self, key: QueryKey, fetch: F) -> QueryState<T> {
        let mut traces = Traces::default();
        let state = self.observe_locked(key, fetch, &mut traces);
        traces.emit(self.shared.tracer.as_ref());
        state
    }

    fn observe_locked<F: Fetch<T>>(
        &self,
        key: QueryKey,
        fetch: F,
        traces: &mut Traces,
    ) -> QueryState<T> {
        let mut inner = self.shared.inner.lock();
        if inner.torn_down {
            return inner.state.clone();
        }

        if inner.key.as_ref() == Some(&key) {
            if let Some(traced) = &inner.traced_key {
                traces.push(Trace::MemoHit(traced.clone()));
            }
            return inner.state.clone();
        }

        let cause = if inner.key.is_none() {
            FetchCause::Initial
        } else {
            FetchCause::KeyChanged
        };
        Shared::<T>::cancel_delayed(&mut inner, traces);

        inner.traced_key = Some(TracerQueryKey::from(&key));
        inner.key = Some(key);
        inner.fetch = Some(Arc::new(fetch));
        inner.state = QueryState::Loading;
        Shared::start_fetch(&self.shared, &mut inner, cause, traces);

        inner.state.clone()
    }

    /// Fetch the current key again.
    ///
    /// The displayed state is kept until the new attempt settles; during the
    /// first load it stays `Loading`. Does nothing before the first
    /// observation or after teardown.
    pub fn retry(&self) {
        Shared::refresh(&self.shared, FetchCause::Retry);
    }

    /// Refetch the current key after the configured delay.
    ///
    /// Returns `true` if a timer was armed. At most one timer is pending per
    /// view: while one is armed further requests are dropped and `false` is
    /// returned. The timer is cancelled when the key changes or the view is
    /// torn down.
    pub fn refetch_with_delay(&self) -> bool {
        Shared::schedule_refetch(&self.shared)
    }

    /// Get a weak handle that child widgets can use to trigger refetches.
    pub fn handle(&self) -> ViewHandle<T> {
        ViewHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// The current state.
    pub fn state(&self) -> QueryState<T> {
        self.shared.inner.lock().state.clone()
    }

    /// The current state together with whether a fetch is in flight.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.shared.snapshots.borrow().clone()
    }

    /// The key of the last observation.
    pub fn key(&self) -> Option<QueryKey> {
        self.shared.inner.lock().key.clone()
    }

    /// Whether a delayed refetch is armed.
    pub fn has_pending_refetch(&self) -> bool {
        self.shared.inner.lock().delayed.is_some()
    }

    /// Whether the view has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.shared.inner.lock().torn_down
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.shared.snapshots.subscribe()
    }

    /// Wait until no fetch is in flight and return the state.
    pub async fn settled(&self) -> QueryState<T> {
        let mut rx = self.shared.snapshots.subscribe();
        let settled = rx.wait_for(|snapshot| !snapshot.fetching).await;
        match settled {
            Ok(snapshot) => snapshot.state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Render the current state with `renderer`.
    pub fn render<R: Render<T> + ?Sized>(&self, renderer: &mut R) -> R::Output {
        self.state().render(renderer)
    }

    /// Tear the view down.
    ///
    /// Aborts the pending delayed refetch and makes every in-flight fetch
    /// discard its result. The last state stays readable. Called on drop.
    pub fn teardown(&self) {
        self.shared.teardown();
    }
}

impl<T: Send + Sync + 'static> Drop for RemoteQueryView<T> {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn start_fetch(shared: &Arc<Self>, inner: &mut Inner<T>, cause: FetchCause, traces: &mut Traces) {
        let (Some(key), Some(fetch)) = (inner.key.clone(), inner.fetch.clone()) else {
            return;
        };
        let traced = inner
            .traced_key
            .clone()
            .unwrap_or_else(|| TracerQueryKey::from(&key));

        let request = RequestId::next();
        inner.latest = Some(request);

        traces.push(Trace::FetchStart(request, traced.clone(), cause));
        shared.publish(inner);

        let weak = Arc::downgrade(shared);
        let tracer = shared.tracer.clone();
        tokio::spawn(async move {
            let result = fetch.fetch().await;
            match weak.upgrade() {
                Some(shared) => shared.settle(request, &key, &traced, result),
                None => tracer.on_fetch_discarded(request, &traced, DiscardReason::TornDown),
            }
        });
    }

    fn settle(
        &self,
        request: RequestId,
        key: &QueryKey,
        traced: &TracerQueryKey,
        result: Result<T, FetchError>,
    ) {
        let trace = match self.apply(request, key, result) {
            Settlement::Applied(outcome) => Trace::Settled(request, traced.clone(), outcome),
            Settlement::Discarded(reason) => Trace::Discarded(request, traced.clone(), reason),
        };
        Traces(vec![trace]).emit(self.tracer.as_ref());
    }

    fn apply(&self, request: RequestId, key: &QueryKey, result: Result<T, FetchError>) -> Settlement {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            return Settlement::Discarded(DiscardReason::TornDown);
        }
        if inner.latest != Some(request) || inner.key.as_ref() != Some(key) {
            return Settlement::Discarded(DiscardReason::Superseded);
        }

        inner.latest = None;
        let outcome = match result {
            Ok(data) => {
                inner.state = QueryState::success(data);
                FetchOutcome::Success
            }
            Err(err) => {
                let message = err.display_message();
                inner.state = QueryState::error(message.clone());
                FetchOutcome::Error { message }
            }
        };
        self.publish(&inner);
        Settlement::Applied(outcome)
    }

    fn refresh(shared: &Arc<Self>, cause: FetchCause) {
        let mut traces = Traces::default();
        {
            let mut inner = shared.inner.lock();
            if inner.torn_down || inner.key.is_none() {
                return;
            }
            Self::start_fetch(shared, &mut inner, cause, &mut traces);
        }
        traces.emit(shared.tracer.as_ref());
    }

    fn schedule_refetch(shared: &Arc<Self>) -> bool {
        let mut traces = Traces::default();
        let armed = Self::schedule_refetch_locked(shared, &mut traces);
        traces.emit(shared.tracer.as_ref());
        armed
    }

    fn schedule_refetch_locked(shared: &Arc<Self>, traces: &mut Traces) -> bool {
        let mut inner = shared.inner.lock();
        if inner.torn_down {
            return false;
        }
        let Some(traced) = inner.traced_key.clone() else {
            return false;
        };
        if inner.delayed.is_some() {
            traces.push(Trace::RefetchCoalesced(traced));
            return false;
        }

        inner.next_timer += 1;
        let id = inner.next_timer;
        let delay = shared.refetch_delay;
        let weak = Arc::downgrade(shared);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                Self::fire_delayed(&shared, id);
            }
        });
        inner.delayed = Some(DelayedRefetch { id, handle });
        traces.push(Trace::RefetchScheduled(traced, delay));
        true
    }

    fn fire_delayed(shared: &Arc<Self>, id: u64) {
        let mut traces = Traces::default();
        {
            let mut inner = shared.inner.lock();
            // A key change or teardown may have replaced this timer after it woke up.
            if inner.delayed.as_ref().map(|timer| timer.id) != Some(id) {
                return;
            }
            inner.delayed = None;
            if inner.torn_down || inner.key.is_none() {
                return;
            }
            Self::start_fetch(shared, &mut inner, FetchCause::DelayedRefetch, &mut traces);
        }
        traces.emit(shared.tracer.as_ref());
    }

    fn cancel_delayed(inner: &mut Inner<T>, traces: &mut Traces) {
        if let Some(timer) = inner.delayed.take() {
            timer.handle.abort();
            if let Some(traced) = &inner.traced_key {
                traces.push(Trace::RefetchCancelled(traced.clone()));
            }
        }
    }

    fn teardown(&self) {
        let mut traces = Traces::default();
        {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            Self::cancel_delayed(&mut inner, &mut traces);
            inner.fetch = None;
            inner.latest = None;
            traces.push(Trace::TornDown);
            self.publish(&inner);
        }
        traces.emit(self.tracer.as_ref());
    }

    fn publish(&self, inner: &Inner<T>) {
        self.snapshots.send_replace(Snapshot {
            state: inner.state.clone(),
            fetching: inner.latest.is_some(),
        });
    }
}

enum Settlement {
    Applied(FetchOutcome),
    Discarded(DiscardReason),
}

/// A tracer call recorded while the view lock is held.
///
/// Tracers may read the view back, so calls are only made once the lock
/// is released.
enum Trace {
    MemoHit(TracerQueryKey),
    FetchStart(RequestId, TracerQueryKey, FetchCause),
    Settled(RequestId, TracerQueryKey, FetchOutcome),
    Discarded(RequestId, TracerQueryKey, DiscardReason),
    RefetchScheduled(TracerQueryKey, Duration),
    RefetchCoalesced(TracerQueryKey),
    RefetchCancelled(TracerQueryKey),
    TornDown,
}

#[derive(Default)]
struct Traces(Vec<Trace>);

impl Traces {
    fn push(&mut self, trace: Trace) {
        self.0.push(trace);
    }

    fn emit(self, tracer: &dyn Tracer) {
        for trace in self.0 {
            match trace {
                Trace::MemoHit(key) => tracer.on_memo_hit(&key),
                Trace::FetchStart(request, key, cause) => tracer.on_fetch_start(request, &key, cause),
                Trace::Settled(request, key, outcome) => {
                    tracer.on_fetch_settled(request, &key, outcome)
                }
                Trace::Discarded(request, key, reason) => {
                    tracer.on_fetch_discarded(request, &key, reason)
                }
                Trace::RefetchScheduled(key, delay) => tracer.on_refetch_scheduled(&key, delay),
                Trace::RefetchCoalesced(key) => tracer.on_refetch_coalesced(&key),
                Trace::RefetchCancelled(key) => tracer.on_refetch_cancelled(&key),
                Trace::TornDown => tracer.on_teardown(),
            }
        }
    }
}

/// Weak handle to a view, for child actions that refetch after mutating.
///
/// All methods do nothing once the view has been dropped.
pub struct ViewHandle<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Clone for ViewHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> ViewHandle<T> {
    /// See [`RemoteQueryView::retry`].
    pub fn retry(&self) {
        if let Some(shared) = self.shared.upgrade() {
            Shared::refresh(&shared, FetchCause::Retry);
        }
    }

    /// See [`RemoteQueryView::refetch_with_delay`]. Returns `false` once the view is gone.
    pub fn refetch_with_delay(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => Shared::schedule_refetch(&shared),
            None => false,
        }
    }

    /// Whether the view still exists and has not been torn down.
    pub fn is_alive(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| !shared.inner.lock().torn_down)
    }
}

/// Builder for [`RemoteQueryView`].
pub struct RemoteQueryViewBuilder<T> {
    refetch_delay: Duration,
    tracer: Arc<dyn Tracer>,
    _data: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Default for RemoteQueryViewBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> RemoteQueryViewBuilder<T> {
    /// Create a builder with the default delay and the [`LogTracer`].
    pub fn new() -> Self {
        Self {
            refetch_delay: DEFAULT_REFETCH_DELAY,
            tracer: Arc::new(LogTracer),
            _data: PhantomData,
        }
    }

    /// Set the delay used by delayed refetches.
    pub fn refetch_delay(mut self, delay: Duration) -> Self {
        self.refetch_delay = delay;
        self
    }

    /// Set the tracer.
    pub fn tracer<R: Tracer>(mut self, tracer: R) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Set a tracer that is shared with other views.
    pub fn shared_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Build the view.
    pub fn build(self) -> RemoteQueryView<T> {
        let (snapshots, _) = watch::channel(Snapshot::default());
        RemoteQueryView {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    key: None,
                    traced_key: None,
                    fetch: None,
                    state: QueryState::Idle,
                    latest: None,
                    delayed: None,
                    next_timer: 0,
                    torn_down: false,
                }),
                snapshots,
                refetch_delay: self.refetch_delay,
                tracer: self.tracer,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::NoopTracer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quiet<T: Send + Sync + 'static>() -> RemoteQueryView<T> {
        RemoteQueryView::builder().tracer(NoopTracer).build()
    }

    #[test]
    fn new_view_is_idle() {
        let view = quiet::<u32>();
        assert!(view.state().is_idle());
        assert!(view.key().is_none());
        assert!(!view.snapshot().fetching);
    }

    #[tokio::test]
    async fn retry_before_observe_is_noop() {
        let view = quiet::<u32>();
        view.retry();
        assert!(!view.refetch_with_delay());
        assert!(view.state().is_idle());
    }

    #[tokio::test]
    async fn observe_after_teardown_does_not_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let view = quiet::<u32>();
        view.teardown();

        let counter = calls.clone();
        let state = view.observe(QueryKey::new("ns", "i", 1u32), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        });

        assert!(state.is_idle());
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(view.is_torn_down());
    }

    #[tokio::test]
    async fn handle_outliving_view_is_inert() {
        let view = quiet::<u32>();
        let handle = view.handle();
        assert!(handle.is_alive());
        drop(view);
        assert!(!handle.is_alive());
        assert!(!handle.refetch_with_delay());
        handle.retry();
    }
}
