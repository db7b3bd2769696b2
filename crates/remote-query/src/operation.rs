//! Query operations and the options of a query page.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ToolbarError;

/// Supported query operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperationKind {
    #[default]
    #[serde(rename = "find")]
    Find,
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "findOne")]
    FindOne,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Find,
        OperationKind::Count,
        OperationKind::FindOne,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Find => "find",
            OperationKind::Count => "count",
            OperationKind::FindOne => "findOne",
        }
    }

    /// Only `find` takes a sort expression and a limit.
    pub fn uses_sort_and_limit(self) -> bool {
        matches!(self, OperationKind::Find)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ToolbarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ToolbarError::UnknownOperation(s.to_string()))
    }
}

pub const DEFAULT_FILTER: &str = "{}";
pub const DEFAULT_SORT: &str = r#"{"_id" : -1}"#;
pub const DEFAULT_LIMIT: u32 = 50;

/// Options of a document query page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub operation: OperationKind,
    pub filter: String,
    pub sort: String,
    pub limit: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            operation: OperationKind::Find,
            filter: DEFAULT_FILTER.to_string(),
            sort: DEFAULT_SORT.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }
}
