//! Bridge from the view [`Tracer`] to an [`EventSink`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use remote_query::tracer::{
    DiscardReason, FetchCause, FetchOutcome, RequestId, Tracer, TracerQueryKey,
};

use crate::events::FlowEvent;
use crate::sink::EventSink;

/// A [`Tracer`] that turns every callback into a [`FlowEvent`].
///
/// Settled and discarded events carry the wall-clock time since the matching
/// start. One tracer may be shared by several views; request ids are unique
/// across views, so timings are tracked per key and request.
pub struct EventSinkTracer {
    sink: Arc<dyn EventSink>,
    started: Mutex<HashMap<(TracerQueryKey, RequestId), Instant>>,
}

impl EventSinkTracer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            started: Mutex::new(HashMap::new()),
        }
    }

    fn elapsed(&self, key: &TracerQueryKey, request: RequestId) -> Duration {
        self.started
            .lock()
            .remove(&(key.clone(), request))
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

impl Tracer for EventSinkTracer {
    fn on_fetch_start(&self, request: RequestId, key: &TracerQueryKey, cause: FetchCause) {
        self.started
            .lock()
            .insert((key.clone(), request), Instant::now());
        self.sink.emit(FlowEvent::FetchStart {
            request,
            key: key.clone(),
            cause,
        });
    }

    fn on_fetch_settled(&self, request: RequestId, key: &TracerQueryKey, outcome: FetchOutcome) {
        let duration = self.elapsed(key, request);
        self.sink.emit(FlowEvent::FetchSettled {
            request,
            key: key.clone(),
            outcome,
            duration,
        });
    }

    fn on_fetch_discarded(&self, request: RequestId, key: &TracerQueryKey, reason: DiscardReason) {
        let duration = self.elapsed(key, request);
        self.sink.emit(FlowEvent::FetchDiscarded {
            request,
            key: key.clone(),
            reason,
            duration,
        });
    }

    fn on_memo_hit(&self, key: &TracerQueryKey) {
        self.sink.emit(FlowEvent::MemoHit { key: key.clone() });
    }

    fn on_refetch_scheduled(&self, key: &TracerQueryKey, delay: Duration) {
        self.sink.emit(FlowEvent::RefetchScheduled {
            key: key.clone(),
            delay,
        });
    }

    fn on_refetch_coalesced(&self, key: &TracerQueryKey) {
        self.sink.emit(FlowEvent::RefetchCoalesced { key: key.clone() });
    }

    fn on_refetch_cancelled(&self, key: &TracerQueryKey) {
        self.sink.emit(FlowEvent::RefetchCancelled { key: key.clone() });
    }

    fn on_teardown(&self) {
        self.sink.emit(FlowEvent::TornDown);
        self.sink.flush();
    }
}
