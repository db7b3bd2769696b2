//! Tracer trait for observing view lifecycles.
//!
//! This module defines the [`Tracer`] trait and related types for observing
//! what a [`RemoteQueryView`](crate::RemoteQueryView) does: which fetches it
//! issues, how they settle, which results it throws away and what happens to
//! delayed refetches. [`NoopTracer`] ignores everything, [`LogTracer`]
//! forwards to the `tracing` crate.
//!
//! # Example
//!
//! ```
//! use remote_query::tracer::{FetchCause, RequestId, Tracer, TracerQueryKey};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn on_fetch_start(&self, request: RequestId, key: &TracerQueryKey, cause: FetchCause) {
//!         println!("{request:?} {key:?} {cause:?}");
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::key::QueryKey;

/// Identifier of one fetch. Unique within the process, so a tracer shared
/// by several views can tell their requests apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RequestId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Represents a query key in a type-erased manner for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TracerQueryKey {
    /// Namespace of the key (e.g. `"mongodb/find"`).
    pub namespace: String,
    /// Instance identifier of the key.
    pub instance: String,
    /// Debug representation of the parameters.
    pub params_debug: String,
}

impl TracerQueryKey {
    /// Create a new tracer query key.
    pub fn new(
        namespace: impl Into<String>,
        instance: impl Into<String>,
        params_debug: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            instance: instance.into(),
            params_debug: params_debug.into(),
        }
    }
}

impl From<&QueryKey> for TracerQueryKey {
    fn from(key: &QueryKey) -> Self {
        Self {
            namespace: key.namespace().to_string(),
            instance: key.instance().to_string(),
            params_debug: key.params_debug(),
        }
    }
}

impl fmt::Display for TracerQueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.instance, self.params_debug)
    }
}

/// Why a fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchCause {
    /// First observation of a view.
    Initial,
    /// The observed key changed.
    KeyChanged,
    /// `retry()` was invoked.
    Retry,
    /// A delayed refetch timer fired.
    DelayedRefetch,
}

/// How a fetch settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchOutcome {
    /// The fetch resolved and its data was applied.
    Success,
    /// The fetch rejected and its message was applied.
    Error {
        /// The displayed message.
        message: String,
    },
}

/// Why a settled fetch was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// A newer fetch (new key or retry) was issued after this one.
    Superseded,
    /// The view was torn down while the fetch was in flight.
    TornDown,
}

/// Tracer trait for observing view lifecycles.
///
/// All methods have default empty implementations, so implementors only
/// override the events they care about.
///
/// # Thread Safety
///
/// Fetches settle on Tokio worker threads, so implementations must be
/// `Send + Sync`. Callbacks run after the view has released its lock, so
/// a tracer may read the view back through a [`ViewHandle`](crate::ViewHandle).
pub trait Tracer: Send + Sync + 'static {
    /// Called when a fetch is issued.
    #[inline]
    fn on_fetch_start(&self, _request: RequestId, _key: &TracerQueryKey, _cause: FetchCause) {}

    /// Called when a fetch settles and its result is applied.
    #[inline]
    fn on_fetch_settled(&self, _request: RequestId, _key: &TracerQueryKey, _outcome: FetchOutcome) {
    }

    /// Called when a settled fetch is discarded instead of applied.
    #[inline]
    fn on_fetch_discarded(
        &self,
        _request: RequestId,
        _key: &TracerQueryKey,
        _reason: DiscardReason,
    ) {
    }

    /// Called when an observation reuses the current key without fetching.
    #[inline]
    fn on_memo_hit(&self, _key: &TracerQueryKey) {}

    /// Called when a delayed refetch timer is armed.
    #[inline]
    fn on_refetch_scheduled(&self, _key: &TracerQueryKey, _delay: Duration) {}

    /// Called when a delayed refetch request is dropped because a timer is already armed.
    #[inline]
    fn on_refetch_coalesced(&self, _key: &TracerQueryKey) {}

    /// Called when an armed timer is cancelled by a key change or teardown.
    #[inline]
    fn on_refetch_cancelled(&self, _key: &TracerQueryKey) {}

    /// Called when the view is torn down.
    #[inline]
    fn on_teardown(&self) {}
}

/// Zero-cost tracer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that forwards every event to the `tracing` crate.
///
/// This is the default tracer of a view.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn on_fetch_start(&self, request: RequestId, key: &TracerQueryKey, cause: FetchCause) {
        tracing::debug!(request = request.0, key = %key, ?cause, "fetch started");
    }

    fn on_fetch_settled(&self, request: RequestId, key: &TracerQueryKey, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success => {
                tracing::debug!(request = request.0, key = %key, "fetch succeeded");
            }
            FetchOutcome::Error { message } => {
                tracing::debug!(request = request.0, key = %key, %message, "fetch failed");
            }
        }
    }

    fn on_fetch_discarded(&self, request: RequestId, key: &TracerQueryKey, reason: DiscardReason) {
        tracing::trace!(request = request.0, key = %key, ?reason, "stale fetch result discarded");
    }

    fn on_memo_hit(&self, key: &TracerQueryKey) {
        tracing::trace!(key = %key, "key unchanged, reusing state");
    }

    fn on_refetch_scheduled(&self, key: &TracerQueryKey, delay: Duration) {
        tracing::debug!(key = %key, delay_ms = delay.as_millis() as u64, "delayed refetch scheduled");
    }

    fn on_refetch_coalesced(&self, key: &TracerQueryKey) {
        tracing::trace!(key = %key, "delayed refetch already pending");
    }

    fn on_refetch_cancelled(&self, key: &TracerQueryKey) {
        tracing::debug!(key = %key, "delayed refetch cancelled");
    }

    fn on_teardown(&self) {
        tracing::trace!("view torn down");
    }
}
