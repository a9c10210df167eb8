//! Task table access over PostgREST.

use reqwest::Method;
use serde::Serialize;
use todo_sync_app::{Identity, RemoteTaskRepository};
use todo_sync_core::{Task, TaskId};
use tracing::debug;

use crate::error::RemoteError;
use crate::{Backend, send, send_json};

const RETURN_REPRESENTATION: &str = "return=representation";

/// [`RemoteTaskRepository`] backed by a PostgREST table.
///
/// The table needs `id`, `text`, `completed` and `created_at` columns, with
/// `id` and `created_at` filled in by the database and a row-level policy
/// scoping rows to `auth.uid()`.
#[derive(Clone)]
pub struct RestStore {
    backend: Backend,
    table: String,
}

#[derive(Serialize)]
struct NewRow<'a> {
    text: &'a str,
    completed: bool,
}

#[derive(Serialize)]
struct CompletedPatch {
    completed: bool,
}

#[derive(Serialize)]
struct TextPatch<'a> {
    text: &'a str,
}

impl RestStore {
    /// Store over `table` using `backend`'s credentials.
    pub fn new(backend: Backend, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: table.into(),
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn url(&self) -> String {
        self.backend.rest_url(&self.table)
    }

    fn row_filter(id: TaskId) -> [(&'static str, String); 1] {
        [("id", format!("eq.{id}"))]
    }

    async fn patch_one<B: Serialize + Sync>(&self, id: TaskId, body: &B) -> Result<Task, RemoteError> {
        let request = self
            .backend
            .authed(Method::PATCH, &self.url())?
            .query(&Self::row_filter(id))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        let rows: Vec<Task> = send_json(request).await?;
        single_row(rows, id)
    }
}

fn single_row(rows: Vec<Task>, id: TaskId) -> Result<Task, RemoteError> {
    rows.into_iter().next().ok_or(RemoteError::MissingRow(id))
}

impl RemoteTaskRepository for RestStore {
    type Error = RemoteError;

    async fn list(&self, owner: &Identity) -> Result<Vec<Task>, Self::Error> {
        debug!(table = %self.table, user = %owner.user_id, "fetching tasks");
        let request = self
            .backend
            .authed(Method::GET, &self.url())?
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        send_json(request).await
    }

    async fn create(&self, text: &str) -> Result<Task, Self::Error> {
        let request = self
            .backend
            .authed(Method::POST, &self.url())?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[NewRow { text, completed: false }]);
        let rows: Vec<Task> = send_json(request).await?;
        rows.into_iter().next().ok_or(RemoteError::EmptyInsert)
    }

    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, Self::Error> {
        self.patch_one(id, &CompletedPatch { completed }).await
    }

    async fn set_text(&self, id: TaskId, text: &str) -> Result<Task, Self::Error> {
        self.patch_one(id, &TextPatch { text }).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), Self::Error> {
        let request = self
            .backend
            .authed(Method::DELETE, &self.url())?
            .query(&Self::row_filter(id));
        send(request).await?;
        Ok(())
    }
}
