//! Remote task repository abstraction consumed by [`crate::TaskStore`].

use std::sync::Arc;

use anyhow::Error;
use todo_sync_core::{Task, TaskId};

use crate::session::Identity;

/// Authoritative CRUD store for the signed-in user's tasks.
///
/// Row ownership and authorization are enforced by the backend; ids and
/// creation timestamps are assigned there too. Timeouts are the
/// implementation's business and surface as ordinary errors.
#[allow(async_fn_in_trait)]
pub trait RemoteTaskRepository {
    /// Error type bubbled up from the backend.
    type Error: Into<Error>;

    /// Fetch every task visible to `owner`, newest first.
    ///
    /// # Errors
    /// Returns a backend-specific error when the query fails.
    async fn list(&self, owner: &Identity) -> Result<Vec<Task>, Self::Error>;

    /// Insert a task and return the stored row.
    ///
    /// # Errors
    /// Returns a backend-specific error when the insert fails.
    async fn create(&self, text: &str) -> Result<Task, Self::Error>;

    /// Write the completion flag and return the stored row.
    ///
    /// # Errors
    /// Returns a backend-specific error when the update fails.
    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, Self::Error>;

    /// Write the text and return the stored row.
    ///
    /// # Errors
    /// Returns a backend-specific error when the update fails.
    async fn set_text(&self, id: TaskId, text: &str) -> Result<Task, Self::Error>;

    /// Delete a task.
    ///
    /// # Errors
    /// Returns a backend-specific error when the delete fails.
    async fn delete(&self, id: TaskId) -> Result<(), Self::Error>;
}

impl<R: RemoteTaskRepository> RemoteTaskRepository for Arc<R> {
    type Error = R::Error;

    async fn list(&self, owner: &Identity) -> Result<Vec<Task>, Self::Error> {
        self.as_ref().list(owner).await
    }

    async fn create(&self, text: &str) -> Result<Task, Self::Error> {
        self.as_ref().create(text).await
    }

    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, Self::Error> {
        self.as_ref().set_completed(id, completed).await
    }

    async fn set_text(&self, id: TaskId, text: &str) -> Result<Task, Self::Error> {
        self.as_ref().set_text(id, text).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), Self::Error> {
        self.as_ref().delete(id).await
    }
}
