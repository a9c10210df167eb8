//! Error taxonomy surfaced by [`crate::TaskStore`].

use std::fmt;

use thiserror::Error;
use todo_sync_core::{EmptyText, TaskId};

/// Remote call issued by the store, used to label failures and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOp {
    /// Fetch the full collection.
    List,
    /// Insert a new task.
    Create,
    /// Write the completion flag.
    SetCompleted,
    /// Write the task text.
    SetText,
    /// Delete a task.
    Delete,
}

impl RepositoryOp {
    /// Short name for messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list tasks",
            Self::Create => "create task",
            Self::SetCompleted => "update completion",
            Self::SetText => "update text",
            Self::Delete => "delete task",
        }
    }
}

impl fmt::Display for RepositoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by store operations.
///
/// Every variant leaves the store in its previous consistent state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller-supplied content was rejected before reaching the backend.
    #[error("invalid task: {0}")]
    Validation(#[from] EmptyText),

    /// No authenticated identity; the caller should prompt for sign-in.
    #[error("sign-in required")]
    AuthRequired,

    /// The targeted task is not in the local collection.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The backend call failed; any optimistic change was rolled back.
    #[error("failed to {operation}")]
    Repository {
        /// Call that failed.
        operation: RepositoryOp,
        /// Underlying repository error.
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub(crate) fn repository<E: Into<anyhow::Error>>(operation: RepositoryOp, source: E) -> Self {
        Self::Repository {
            operation,
            source: source.into(),
        }
    }

    /// True for [`StoreError::AuthRequired`].
    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }

    /// True for [`StoreError::Validation`].
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// True for [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for [`StoreError::Repository`].
    #[must_use]
    pub const fn is_repository(&self) -> bool {
        matches!(self, Self::Repository { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn repository_error_keeps_source_chain() {
        let err = StoreError::repository(RepositoryOp::SetText, anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "failed to update text");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("connection reset"));
        assert!(err.is_repository());
    }

    #[test]
    fn validation_converts_from_empty_text() {
        let err: StoreError = EmptyText.into();
        assert!(err.is_validation());
        assert!(!err.is_auth_required());
    }
}
