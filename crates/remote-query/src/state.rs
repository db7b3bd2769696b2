//! Lifecycle state of a remote query.

use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a remote query.
///
/// Exactly one variant is active at a time. Successful data is held in an
/// `Arc` so snapshots can be handed out without cloning the payload.
pub enum QueryState<T> {
    /// Nothing has been observed yet.
    Idle,
    /// The first fetch for the current key is in flight and there is nothing to show.
    Loading,
    /// The latest fetch for the current key resolved.
    Success {
        /// The fetched data.
        data: Arc<T>,
    },
    /// The latest fetch for the current key rejected.
    Error {
        /// User-facing error message.
        message: String,
    },
}

impl<T> QueryState<T> {
    /// Create a success state from an owned value.
    pub fn success(data: T) -> Self {
        QueryState::Success {
            data: Arc::new(data),
        }
    }

    /// Create an error state.
    pub fn error(message: impl Into<String>) -> Self {
        QueryState::Error {
            message: message.into(),
        }
    }

    /// Check if nothing has been observed yet.
    pub fn is_idle(&self) -> bool {
        matches!(self, QueryState::Idle)
    }

    /// Check if the state is waiting for its first result.
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }

    /// Check if the state is `Success` or `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Success { .. } | QueryState::Error { .. })
    }

    /// Get the data if the state is `Success`.
    pub fn data(&self) -> Option<&Arc<T>> {
        match self {
            QueryState::Success { data } => Some(data),
            _ => None,
        }
    }

    /// Get the error message if the state is `Error`.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            QueryState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Dispatch to the matching callback of `renderer`.
    ///
    /// A `Success` whose data the renderer considers empty goes to
    /// [`Render::empty`] instead of [`Render::success`].
    pub fn render<R: Render<T> + ?Sized>(&self, renderer: &mut R) -> R::Output {
        match self {
            QueryState::Idle => renderer.idle(),
            QueryState::Loading => renderer.loading(),
            QueryState::Success { data } if renderer.is_empty(data) => renderer.empty(),
            QueryState::Success { data } => renderer.success(data),
            QueryState::Error { message } => renderer.error(message),
        }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        match self {
            QueryState::Idle => QueryState::Idle,
            QueryState::Loading => QueryState::Loading,
            QueryState::Success { data } => QueryState::Success { data: data.clone() },
            QueryState::Error { message } => QueryState::Error {
                message: message.clone(),
            },
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        QueryState::Idle
    }
}

impl<T: PartialEq> PartialEq for QueryState<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (QueryState::Idle, QueryState::Idle) => true,
            (QueryState::Loading, QueryState::Loading) => true,
            (QueryState::Success { data: a }, QueryState::Success { data: b }) => a == b,
            (QueryState::Error { message: a }, QueryState::Error { message: b }) => a == b,
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Idle => write!(f, "QueryState::Idle"),
            QueryState::Loading => write!(f, "QueryState::Loading"),
            QueryState::Success { data } => write!(f, "QueryState::Success({:?})", data),
            QueryState::Error { message } => write!(f, "QueryState::Error({:?})", message),
        }
    }
}

/// Render callbacks, one per lifecycle state.
///
/// # Example
///
/// ```
/// use remote_query::{QueryState, Render};
///
/// struct Text;
///
/// impl Render<Vec<u32>> for Text {
///     type Output = String;
///
///     fn idle(&mut self) -> String { String::new() }
///     fn loading(&mut self) -> String { "loading".into() }
///     fn success(&mut self, data: &Vec<u32>) -> String { format!("{} rows", data.len()) }
///     fn error(&mut self, message: &str) -> String { format!("error: {message}") }
///     fn empty(&mut self) -> String { "no rows".into() }
///     fn is_empty(&self, data: &Vec<u32>) -> bool { data.is_empty() }
/// }
///
/// assert_eq!(QueryState::success(vec![1, 2]).render(&mut Text), "2 rows");
/// assert_eq!(QueryState::success(Vec::new()).render(&mut Text), "no rows");
/// ```
pub trait Render<T> {
    /// What a callback produces.
    type Output;

    /// Nothing observed yet.
    fn idle(&mut self) -> Self::Output;

    /// First load in flight.
    fn loading(&mut self) -> Self::Output;

    /// Data is available.
    fn success(&mut self, data: &T) -> Self::Output;

    /// The fetch failed; callers usually pair this with a retry affordance.
    fn error(&mut self, message: &str) -> Self::Output;

    /// Data is available but empty.
    fn empty(&mut self) -> Self::Output;

    /// Decide whether successful data counts as empty.
    fn is_empty(&self, _data: &T) -> bool {
        false
    }
}

/// A state together with whether a fetch is currently in flight.
///
/// During a soft refresh `state` keeps the previous terminal value while
/// `fetching` is `true`.
pub struct Snapshot<T> {
    /// The displayed state.
    pub state: QueryState<T>,
    /// Whether a fetch for the current key is in flight.
    pub fetching: bool,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            fetching: self.fetching,
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            state: QueryState::Idle,
            fetching: false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("state", &self.state)
            .field("fetching", &self.fetching)
            .finish()
    }
}
