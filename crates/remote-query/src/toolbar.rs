//! Toolbars: pending edits committed atomically into query options.

use crate::error::ToolbarError;
use crate::history::{history_identifier, HistoryStore};
use crate::operation::{OperationKind, QueryOptions};

/// Holds the options a page queries with and the edits not yet applied.
///
/// Edits touch only the pending copy. [`commit`](Self::commit) replaces the
/// committed options with the pending ones in one step, so a view keyed on
/// the committed options sees either none or all of the edits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Toolbar<O> {
    pending: O,
    committed: O,
}

impl<O: Clone> Toolbar<O> {
    pub fn new(options: O) -> Self {
        Self {
            pending: options.clone(),
            committed: options,
        }
    }

    pub fn pending(&self) -> &O {
        &self.pending
    }

    pub fn committed(&self) -> &O {
        &self.committed
    }

    /// Apply `edit` to the pending options.
    pub fn edit(&mut self, edit: impl FnOnce(&mut O)) {
        edit(&mut self.pending);
    }

    /// Make the pending options the committed ones.
    pub fn commit(&mut self) -> &O {
        self.committed = self.pending.clone();
        &self.committed
    }

    /// Drop pending edits.
    pub fn reset(&mut self) {
        self.pending = self.committed.clone();
    }
}

impl<O: Clone + PartialEq> Toolbar<O> {
    /// Whether there are edits that were not committed.
    pub fn is_dirty(&self) -> bool {
        self.pending != self.committed
    }
}

/// Plugin prefix of the document query page histories.
pub const MONGODB_HISTORY_PLUGIN: &str = "kobs-mongodb";

impl Toolbar<QueryOptions> {
    pub fn filter_history_identifier() -> String {
        history_identifier(MONGODB_HISTORY_PLUGIN, "filter")
    }

    pub fn sort_history_identifier() -> String {
        history_identifier(MONGODB_HISTORY_PLUGIN, "sort")
    }

    pub fn set_operation(&mut self, operation: &str) -> Result<(), ToolbarError> {
        let operation: OperationKind = operation.parse()?;
        self.pending.operation = operation;
        Ok(())
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.pending.filter = filter.into();
    }

    pub fn set_sort(&mut self, sort: impl Into<String>) {
        self.pending.sort = sort.into();
    }

    /// Set the limit from field text. Non-numeric and zero values are rejected.
    pub fn set_limit(&mut self, limit: &str) -> Result<(), ToolbarError> {
        match limit.trim().parse::<u32>() {
            Ok(value) if value > 0 => {
                self.pending.limit = value;
                Ok(())
            }
            _ => Err(ToolbarError::InvalidLimit(limit.to_string())),
        }
    }

    /// Record the pending filter and sort in `history`, then commit.
    ///
    /// History failures are logged and do not prevent the commit.
    pub fn commit_query(&mut self, history: &HistoryStore) -> &QueryOptions {
        let entries = [
            (Self::filter_history_identifier(), &self.pending.filter),
            (Self::sort_history_identifier(), &self.pending.sort),
        ];
        for (identifier, value) in entries {
            if let Err(err) = history.add(&identifier, value) {
                tracing::warn!(%identifier, error = %err, "failed to record history");
            }
        }
        self.commit()
    }
}

/// Toggle `item` in a multi-select list; the empty item clears the selection.
pub fn toggle_selection(selection: &mut Vec<String>, item: &str) {
    if item.is_empty() {
        selection.clear();
    } else if let Some(index) = selection.iter().position(|existing| existing == item) {
        selection.remove(index);
    } else {
        selection.push(item.to_string());
    }
}
