//! Event sinks.
//!
//! An [`EventSink`] receives every [`FlowEvent`] an [`EventSinkTracer`]
//! produces. [`EventCollector`] keeps them in memory for assertions,
//! [`JsonLinesSink`] writes them out, and the combinators here route them.
//!
//! [`EventSinkTracer`]: crate::EventSinkTracer
//! [`EventCollector`]: crate::EventCollector

use std::io::Write;

use parking_lot::Mutex;

use crate::events::FlowEvent;

/// Receives view events.
///
/// # Example
///
/// ```
/// use remote_query_inspector::{EventSink, FlowEvent};
///
/// struct PrintSink;
///
/// impl EventSink for PrintSink {
///     fn emit(&self, event: FlowEvent) {
///         println!("{event:?}");
///     }
/// }
/// ```
pub trait EventSink: Send + Sync + 'static {
    /// Called when an event occurs.
    fn emit(&self, event: FlowEvent);

    /// Flush buffered events. The default implementation does nothing.
    fn flush(&self) {}
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: FlowEvent) {}
}

/// Forwards events to several sinks.
pub struct MultiplexSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiplexSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for MultiplexSink {
    fn emit(&self, event: FlowEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

/// Forwards the events accepted by a predicate.
pub struct FilterSink<F, S> {
    filter: F,
    inner: S,
}

impl<F, S> FilterSink<F, S>
where
    F: Fn(&FlowEvent) -> bool + Send + Sync + 'static,
    S: EventSink,
{
    pub fn new(filter: F, inner: S) -> Self {
        Self { filter, inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<F, S> EventSink for FilterSink<F, S>
where
    F: Fn(&FlowEvent) -> bool + Send + Sync + 'static,
    S: EventSink,
{
    fn emit(&self, event: FlowEvent) {
        if (self.filter)(&event) {
            self.inner.emit(event);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Writes each event as one line of JSON.
///
/// Write errors are logged through `tracing` and otherwise ignored, so a
/// broken output never affects the traced views.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send + 'static> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: FlowEvent) {
        let mut writer = self.writer.lock();
        let written = serde_json::to_writer(&mut *writer, &event)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        if let Err(err) = written {
            tracing::warn!(error = %err, "failed to write inspector event");
        }
    }

    fn flush(&self) {
        if let Err(err) = self.writer.lock().flush() {
            tracing::warn!(error = %err, "failed to flush inspector events");
        }
    }
}
