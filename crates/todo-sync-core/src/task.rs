use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::id::TaskId;
use crate::timestamp::{self, local_day};

/// One to-do record as stored by the backend.
///
/// The owning user is never carried client-side; the backend scopes rows to
/// the authenticated identity on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Backend-assigned identifier.
    pub id: TaskId,
    /// User-supplied content.
    pub text: String,
    /// Completion flag.
    #[serde(default)]
    pub completed: bool,
    /// Backend-assigned creation time; `None` when missing or unparseable.
    #[serde(default, with = "timestamp::lenient")]
    pub created_at: Option<OffsetDateTime>,
}

impl Task {
    /// Build a task record.
    #[must_use]
    pub fn new(id: TaskId, text: impl Into<String>, created_at: Option<OffsetDateTime>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            created_at,
        }
    }

    /// Same record with the completion flag set.
    #[must_use]
    pub const fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Calendar day of creation in `offset`, if the task has a timestamp.
    #[must_use]
    pub fn created_day(&self, offset: UtcOffset) -> Option<Date> {
        self.created_at.map(|ts| local_day(ts, offset))
    }

    /// True when the task was created on `day` in `offset`.
    #[must_use]
    pub fn created_on(&self, day: Date, offset: UtcOffset) -> bool {
        self.created_day(offset) == Some(day)
    }
}

/// Ordering used for list display: newest `created_at` first, tasks without a
/// timestamp last, ties broken by descending id.
#[must_use]
pub fn newest_first(a: &Task, b: &Task) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(a_ts), Some(b_ts)) => b_ts.cmp(&a_ts).then_with(|| b.id.cmp(&a.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.id.cmp(&a.id),
    }
}

/// Sort tasks into list display order (stable).
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(newest_first);
}

/// Rejected task content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task text must not be empty")]
pub struct EmptyText;

/// Trim user input, rejecting blank content.
///
/// # Errors
/// Returns [`EmptyText`] when nothing but whitespace remains.
pub fn normalize_text(raw: &str) -> Result<String, EmptyText> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(EmptyText)
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Tasks split into pending and completed, each in input order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskPartition<'a> {
    /// Tasks not yet completed.
    pub pending: Vec<&'a Task>,
    /// Completed tasks.
    pub completed: Vec<&'a Task>,
}

/// Split a collection for list display.
#[must_use]
pub fn partition_by_completion(tasks: &[Task]) -> TaskPartition<'_> {
    let (completed, pending) = tasks.iter().partition(|task| task.completed);
    TaskPartition { pending, completed }
}
