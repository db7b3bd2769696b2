//! Inspector for remote-query views.
//!
//! Turns the [`Tracer`](remote_query::Tracer) callbacks of a view into
//! serializable [`FlowEvent`]s and routes them to an [`EventSink`].
//!
//! - **EventCollector**: collects events for tests and assertions
//! - **JsonLinesSink**: writes one JSON event per line
//! - **FilterSink** / **MultiplexSink**: route events to other sinks
//!
//! # Quick Start
//!
//! ```ignore
//! use remote_query::RemoteQueryView;
//! use remote_query_inspector::{to_kinds, EventCollector, EventSinkTracer};
//! use std::sync::Arc;
//!
//! let collector = Arc::new(EventCollector::new());
//! let view: RemoteQueryView<Vec<Incident>> = RemoteQueryView::builder()
//!     .tracer(EventSinkTracer::new(collector.clone()))
//!     .build();
//!
//! view.observe(key, fetch);
//! view.settled().await;
//!
//! let kinds = to_kinds(&collector.trace());
//! ```

mod collector;
mod events;
mod sink;
mod tracer_impl;

pub use collector::EventCollector;
pub use events::{
    to_kinds, DiscardReason, EventKind, ExecutionTrace, FetchCause, FetchOutcome, FlowEvent,
    RequestId, TracerQueryKey,
};
pub use sink::{EventSink, FilterSink, JsonLinesSink, MultiplexSink, NullSink};
pub use tracer_impl::EventSinkTracer;
