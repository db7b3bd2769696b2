//! Error types.

use std::path::PathBuf;

/// Message shown when a failure carries no usable description.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Failure of a fetch operation.
///
/// Every variant collapses into [`QueryState::Error`](crate::QueryState::Error)
/// through [`FetchError::display_message`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request failed before any response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("api error ({status}): {}", .message.as_deref().unwrap_or(UNKNOWN_ERROR_MESSAGE))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the `error` field of the response body, if any.
        message: Option<String>,
    },

    /// The response could not be understood.
    #[error("unexpected response: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Create an API error carrying a server message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        FetchError::Api {
            status,
            message: Some(message.into()),
        }
    }

    /// The message a view displays for this error.
    ///
    /// API errors keep the server message when there is one; anything without
    /// a usable description falls back to [`UNKNOWN_ERROR_MESSAGE`].
    pub fn display_message(&self) -> String {
        let message = match self {
            FetchError::Api { message, .. } => message.as_deref(),
            FetchError::Network(detail) | FetchError::Unknown(detail) => Some(detail.as_str()),
        };
        match message.map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Unknown(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Unknown(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Failure reading or writing persisted history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The backend could not be read or written.
    #[error("history storage at {} failed: {source}", .path.display())]
    Io {
        /// Location of the failing entry.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A stored entry is not a JSON list of strings.
    #[error("history entry {identifier:?} is malformed: {source}")]
    Malformed {
        /// Identifier of the entry.
        identifier: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The identifier cannot be used as a storage key.
    #[error("invalid history identifier {0:?}")]
    InvalidIdentifier(String),

    /// The process-wide store was installed or used before.
    #[error("global history store already initialized")]
    AlreadyInstalled,
}

/// Failure loading a dynamically loaded plugin module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// The module bundle could not be fetched.
    #[error("failed to load module {name:?} from {url}: {reason}")]
    LoadFailed {
        /// Module name.
        name: String,
        /// Location the bundle was requested from.
        url: String,
        /// Why the load failed.
        reason: String,
    },
}

/// Invalid edit in a query toolbar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolbarError {
    /// The limit field is not a positive integer.
    #[error("limit must be a positive integer, got {0:?}")]
    InvalidLimit(String),

    /// The operation name is not one of the supported operations.
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds a value of the wrong shape.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
}
