//! In-memory event collection for tests.

use parking_lot::Mutex;

use crate::events::{ExecutionTrace, FlowEvent};
use crate::sink::EventSink;

/// Accumulates events for later assertions.
///
/// # Example
///
/// ```ignore
/// let collector = Arc::new(EventCollector::new());
/// let view: RemoteQueryView<u32> = RemoteQueryView::builder()
///     .tracer(EventSinkTracer::new(collector.clone()))
///     .build();
///
/// view.observe(key, fetch);
/// view.settled().await;
/// assert_eq!(collector.trace().applied().count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<FlowEvent>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected events as a trace.
    pub fn trace(&self) -> ExecutionTrace {
        ExecutionTrace {
            events: self.events.lock().clone(),
        }
    }

    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().clone()
    }

    /// Take collected events, clearing the collector.
    pub fn take(&self) -> Vec<FlowEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: FlowEvent) {
        self.events.lock().push(event);
    }
}
