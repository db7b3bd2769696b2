//! Event types for view tracing.
//!
//! One [`FlowEvent`] variant exists per [`Tracer`](remote_query::Tracer)
//! callback. Events are serializable so traces can be written out and
//! compared later.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use remote_query::tracer::{
    DiscardReason, FetchCause, FetchOutcome, RequestId, TracerQueryKey,
};

/// A view lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowEvent {
    /// A fetch was issued.
    FetchStart {
        request: RequestId,
        key: TracerQueryKey,
        cause: FetchCause,
    },
    /// A fetch settled and its result was applied.
    FetchSettled {
        request: RequestId,
        key: TracerQueryKey,
        outcome: FetchOutcome,
        duration: Duration,
    },
    /// A fetch settled after it was superseded or the view was torn down.
    FetchDiscarded {
        request: RequestId,
        key: TracerQueryKey,
        reason: DiscardReason,
        duration: Duration,
    },
    /// An observation reused the current key.
    MemoHit { key: TracerQueryKey },
    /// A delayed refetch was armed.
    RefetchScheduled {
        key: TracerQueryKey,
        delay: Duration,
    },
    /// A delayed refetch request was dropped because one was pending.
    RefetchCoalesced { key: TracerQueryKey },
    /// A pending delayed refetch was cancelled.
    RefetchCancelled { key: TracerQueryKey },
    /// The view was torn down.
    TornDown,
}

impl FlowEvent {
    /// The key the event is about, if any.
    pub fn key(&self) -> Option<&TracerQueryKey> {
        match self {
            FlowEvent::FetchStart { key, .. }
            | FlowEvent::FetchSettled { key, .. }
            | FlowEvent::FetchDiscarded { key, .. }
            | FlowEvent::MemoHit { key }
            | FlowEvent::RefetchScheduled { key, .. }
            | FlowEvent::RefetchCoalesced { key }
            | FlowEvent::RefetchCancelled { key } => Some(key),
            FlowEvent::TornDown => None,
        }
    }
}

/// A sequence of collected events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub events: Vec<FlowEvent>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FlowEvent) {
        self.events.push(event);
    }

    /// Events about `key`.
    pub fn events_for_key(&self, key: &TracerQueryKey) -> Vec<&FlowEvent> {
        self.events
            .iter()
            .filter(|event| event.key() == Some(key))
            .collect()
    }

    /// Issued fetches with their cause.
    pub fn fetch_starts(&self) -> impl Iterator<Item = (RequestId, &TracerQueryKey, FetchCause)> {
        self.events.iter().filter_map(|event| match event {
            FlowEvent::FetchStart {
                request,
                key,
                cause,
            } => Some((*request, key, *cause)),
            _ => None,
        })
    }

    /// Requests whose result was applied.
    pub fn applied(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.events.iter().filter_map(|event| match event {
            FlowEvent::FetchSettled { request, .. } => Some(*request),
            _ => None,
        })
    }

    /// Requests whose result was thrown away, with the reason.
    pub fn discarded(&self) -> impl Iterator<Item = (RequestId, DiscardReason)> + '_ {
        self.events.iter().filter_map(|event| match event {
            FlowEvent::FetchDiscarded {
                request, reason, ..
            } => Some((*request, *reason)),
            _ => None,
        })
    }
}

/// Event kind for comparison, without timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    FetchStart {
        key: TracerQueryKey,
        cause: FetchCause,
    },
    FetchSettled {
        key: TracerQueryKey,
        outcome: FetchOutcome,
    },
    FetchDiscarded {
        key: TracerQueryKey,
        reason: DiscardReason,
    },
    MemoHit {
        key: TracerQueryKey,
    },
    RefetchScheduled {
        key: TracerQueryKey,
    },
    RefetchCoalesced {
        key: TracerQueryKey,
    },
    RefetchCancelled {
        key: TracerQueryKey,
    },
    TornDown,
}

impl From<&FlowEvent> for EventKind {
    fn from(event: &FlowEvent) -> Self {
        match event {
            FlowEvent::FetchStart { key, cause, .. } => EventKind::FetchStart {
                key: key.clone(),
                cause: *cause,
            },
            FlowEvent::FetchSettled { key, outcome, .. } => EventKind::FetchSettled {
                key: key.clone(),
                outcome: outcome.clone(),
            },
            FlowEvent::FetchDiscarded { key, reason, .. } => EventKind::FetchDiscarded {
                key: key.clone(),
                reason: *reason,
            },
            FlowEvent::MemoHit { key } => EventKind::MemoHit { key: key.clone() },
            FlowEvent::RefetchScheduled { key, .. } => {
                EventKind::RefetchScheduled { key: key.clone() }
            }
            FlowEvent::RefetchCoalesced { key } => EventKind::RefetchCoalesced { key: key.clone() },
            FlowEvent::RefetchCancelled { key } => EventKind::RefetchCancelled { key: key.clone() },
            FlowEvent::TornDown => EventKind::TornDown,
        }
    }
}

/// Strip timings and request ids from a trace.
pub fn to_kinds(trace: &ExecutionTrace) -> Vec<EventKind> {
    trace.events.iter().map(EventKind::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TracerQueryKey {
        TracerQueryKey::new("opsgenie/incidents", "hub/ops", "()")
    }

    #[test]
    fn test_event_serialization() {
        let event = FlowEvent::FetchStart {
            request: RequestId(3),
            key: key(),
            cause: FetchCause::Retry,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FetchStart");
        assert_eq!(json["request"], 3);
        assert_eq!(json["cause"], "Retry");

        let back: FlowEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_trace_queries() {
        let other = TracerQueryKey::new("mongodb/query", "dev/mongodb", "()");
        let mut trace = ExecutionTrace::new();
        trace.push(FlowEvent::FetchStart {
            request: RequestId(1),
            key: key(),
            cause: FetchCause::Initial,
        });
        trace.push(FlowEvent::MemoHit { key: other.clone() });
        trace.push(FlowEvent::FetchDiscarded {
            request: RequestId(1),
            key: key(),
            reason: DiscardReason::TornDown,
            duration: Duration::ZERO,
        });
        trace.push(FlowEvent::TornDown);

        assert_eq!(trace.events_for_key(&key()).len(), 2);
        assert_eq!(trace.events_for_key(&other).len(), 1);
        assert_eq!(trace.fetch_starts().count(), 1);
        assert_eq!(
            trace.discarded().collect::<Vec<_>>(),
            vec![(RequestId(1), DiscardReason::TornDown)]
        );
        assert_eq!(trace.applied().count(), 0);
        assert_eq!(to_kinds(&trace).last(), Some(&EventKind::TornDown));
    }
}
