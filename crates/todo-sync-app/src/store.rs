//! The local mirror of the signed-in user's tasks.
//!
//! [`TaskStore`] owns the collection, follows identity changes from a
//! [`SessionProvider`], and routes every mutation through a
//! [`RemoteTaskRepository`]. Field edits and removals are applied locally
//! before the backend answers and rolled back if it refuses. Creation waits
//! for the backend because ids and timestamps are assigned there.
//!
//! Three counters guard in-flight work. The identity epoch moves on every
//! session transition and the load sequence on every [`TaskStore::load`];
//! a load applies only if neither moved while it ran. The clear generation
//! moves only when the collection is emptied for a sign-out or another
//! user, so a mutation still rolls back or reconciles across a restore of
//! the same identity.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::{Date, OffsetDateTime, UtcOffset};
use todo_sync_core::{
    CompletionStats, DailyStats, DashboardWindow, MonthGrid, MonthKey, MonthlyStat, Task, TaskId, TaskPartition,
    UserId, daily_stats, has_task_on, monthly_stats, normalize_text, partition_by_completion, recent_months,
    sort_newest_first, tasks_on, tasks_on_sorted, today_stats,
};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, info, warn};

use crate::error::{RepositoryOp, StoreError};
use crate::optimistic::{Field, FieldEdit, Removal, completed_field, ordered_position, text_field};
use crate::repository::RemoteTaskRepository;
use crate::session::{Identity, SessionProvider, SessionState, SessionTransition, classify};

/// Progress of the most recent collection fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing fetched for the current identity yet.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The collection reflects the last successful fetch.
    Ready,
    /// The last fetch failed; the previous collection is kept.
    Failed(String),
}

/// What became of a [`TaskStore::load`] call that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The fetched collection replaced the local one.
    Applied(usize),
    /// A newer load or an identity change overtook this one; nothing changed.
    Superseded,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    session: SessionState,
    owner: Option<UserId>,
    epoch: u64,
    generation: u64,
    load_seq: u64,
    status: LoadStatus,
    last_error: Option<String>,
}

impl StoreState {
    fn require_identity(&self) -> Result<Identity, StoreError> {
        self.session.identity().cloned().ok_or(StoreError::AuthRequired)
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.tasks.clear();
        self.status = LoadStatus::Idle;
        self.last_error = None;
    }
}

/// Client-side task collection with optimistic writes and auth gating.
pub struct TaskStore<R> {
    repository: R,
    offset: UtcOffset,
    state: Mutex<StoreState>,
    sessions: AsyncMutex<watch::Receiver<SessionState>>,
}

impl<R: RemoteTaskRepository> TaskStore<R> {
    /// Build a store fed by `sessions`.
    ///
    /// The store starts in [`SessionState::Loading`]; call [`Self::start`] to
    /// apply whatever the channel currently holds.
    pub fn new(repository: R, sessions: watch::Receiver<SessionState>, offset: UtcOffset) -> Self {
        Self {
            repository,
            offset,
            state: Mutex::new(StoreState::default()),
            sessions: AsyncMutex::new(sessions),
        }
    }

    /// Build a store subscribed to `provider`.
    pub fn with_provider<P: SessionProvider + ?Sized>(repository: R, provider: &P, offset: UtcOffset) -> Self {
        Self::new(repository, provider.subscribe(), offset)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the provider's current state, loading if it is authenticated.
    ///
    /// # Errors
    /// Returns the load failure, if a load was triggered and failed.
    pub async fn start(&self) -> Result<SessionTransition, StoreError> {
        let current = self.sessions.lock().await.borrow_and_update().clone();
        self.apply_session(current).await
    }

    /// Wait for the next session notification and apply it.
    ///
    /// Returns `None` once the provider is gone.
    pub async fn next_session_change(&self) -> Option<Result<SessionTransition, StoreError>> {
        let next = {
            let mut sessions = self.sessions.lock().await;
            sessions.changed().await.ok()?;
            sessions.borrow_and_update().clone()
        };
        Some(self.apply_session(next).await)
    }

    /// Apply session notifications until the provider is dropped.
    ///
    /// Load failures are logged and recorded in [`Self::status`]; they do not
    /// stop the loop.
    pub async fn follow_session(&self) {
        while let Some(result) = self.next_session_change().await {
            if let Err(err) = result {
                warn!(error = %err, "load after session change failed");
            }
        }
        debug!("session provider closed");
    }

    /// Move the auth gate to `next`.
    ///
    /// Leaving an identity clears the collection before this returns. Gaining
    /// an identity triggers exactly one [`Self::load`].
    ///
    /// # Errors
    /// Returns the load failure, if a load was triggered and failed.
    pub async fn apply_session(&self, next: SessionState) -> Result<SessionTransition, StoreError> {
        let transition = {
            let mut state = self.lock();
            let transition = classify(&state.session, &next);
            let next_owner = next.identity().map(|identity| identity.user_id);
            match transition {
                SessionTransition::Unchanged => {}
                SessionTransition::Restoring => {
                    state.epoch += 1;
                }
                SessionTransition::SignedOut | SessionTransition::SwitchedUser => {
                    state.epoch += 1;
                    state.clear();
                    state.owner = next_owner;
                }
                SessionTransition::SignedIn => {
                    state.epoch += 1;
                    if state.owner != next_owner {
                        state.clear();
                    }
                    state.owner = next_owner;
                }
            }
            state.session = next;
            transition
        };

        if transition != SessionTransition::Unchanged {
            info!(?transition, "session changed");
        }
        if transition.needs_load() {
            self.load().await?;
        }
        Ok(transition)
    }

    /// Replace the collection with the backend's.
    ///
    /// # Errors
    /// [`StoreError::AuthRequired`] without an identity, or
    /// [`StoreError::Repository`] when the fetch fails. A failed fetch leaves
    /// the previous collection in place.
    pub async fn load(&self) -> Result<LoadOutcome, StoreError> {
        let (identity, epoch, seq) = {
            let mut state = self.lock();
            let identity = state.require_identity()?;
            state.load_seq += 1;
            state.status = LoadStatus::Loading;
            (identity, state.epoch, state.load_seq)
        };
        debug!(user = %identity.user_id, seq, "loading tasks");

        let fetched = self.repository.list(&identity).await;

        let mut state = self.lock();
        if state.epoch != epoch || state.load_seq != seq {
            drop(state);
            debug!(seq, "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }
        match fetched {
            Ok(mut tasks) => {
                dedup_ids(&mut tasks);
                sort_newest_first(&mut tasks);
                let count = tasks.len();
                state.tasks = tasks;
                state.status = LoadStatus::Ready;
                state.last_error = None;
                drop(state);
                info!(count, "tasks loaded");
                Ok(LoadOutcome::Applied(count))
            }
            Err(err) => {
                let source: anyhow::Error = err.into();
                let message = format!("{}: {source:#}", RepositoryOp::List);
                state.status = LoadStatus::Failed(message.clone());
                state.last_error = Some(message);
                drop(state);
                warn!(error = %source, "load failed; keeping previous tasks");
                Err(StoreError::repository(RepositoryOp::List, source))
            }
        }
    }

    /// Create a task from `text` and insert the stored row.
    ///
    /// # Errors
    /// [`StoreError::AuthRequired`], [`StoreError::Validation`] for blank
    /// text, or [`StoreError::Repository`]. Failures change nothing locally.
    pub async fn add(&self, text: &str) -> Result<Task, StoreError> {
        let generation = {
            let state = self.lock();
            state.require_identity()?;
            state.generation
        };
        let text = normalize_text(text)?;

        let created = match self.repository.create(&text).await {
            Ok(task) => task,
            Err(err) => return Err(self.fail(generation, RepositoryOp::Create, err.into())),
        };

        let mut state = self.lock();
        if state.generation == generation {
            upsert(&mut state.tasks, created.clone());
            state.last_error = None;
            drop(state);
            info!(id = %created.id, "task created");
        } else {
            drop(state);
            debug!(id = %created.id, "collection cleared during create; not inserting");
        }
        Ok(created)
    }

    /// Flip `completed` on task `id`.
    ///
    /// # Errors
    /// [`StoreError::AuthRequired`], [`StoreError::NotFound`], or
    /// [`StoreError::Repository`] after the flip was rolled back.
    pub async fn toggle_completion(&self, id: TaskId) -> Result<Task, StoreError> {
        self.mutate(id, RepositoryOp::SetCompleted, completed_field, |done| !done, |completed| {
            self.repository.set_completed(id, completed)
        })
        .await
    }

    /// Replace the text of task `id`.
    ///
    /// # Errors
    /// [`StoreError::AuthRequired`], [`StoreError::Validation`] for blank
    /// text, [`StoreError::NotFound`], or [`StoreError::Repository`] after the
    /// edit was rolled back.
    pub async fn update_text(&self, id: TaskId, text: &str) -> Result<Task, StoreError> {
        self.lock().require_identity()?;
        let text = normalize_text(text)?;
        self.mutate(id, RepositoryOp::SetText, text_field, move |_| text, |text: String| async move {
            self.repository.set_text(id, &text).await
        })
        .await
    }

    /// Delete task `id`. Confirmation is the caller's job.
    ///
    /// # Errors
    /// [`StoreError::AuthRequired`], [`StoreError::NotFound`], or
    /// [`StoreError::Repository`] after the task was put back.
    pub async fn remove(&self, id: TaskId) -> Result<(), StoreError> {
        let (removal, generation) = {
            let mut state = self.lock();
            state.require_identity()?;
            let generation = state.generation;
            let removal = Removal::take(&mut state.tasks, id).ok_or(StoreError::NotFound(id))?;
            (removal, generation)
        };
        debug!(%id, "removed locally");

        match self.repository.delete(id).await {
            Ok(()) => {
                info!(%id, "task deleted");
                Ok(())
            }
            Err(err) => {
                let source: anyhow::Error = err.into();
                let mut state = self.lock();
                if state.generation == generation {
                    let outcome = removal.restore(&mut state.tasks);
                    state.last_error = Some(format!("{}: {source:#}", RepositoryOp::Delete));
                    drop(state);
                    warn!(%id, ?outcome, error = %source, "delete failed; task restored");
                }
                Err(StoreError::repository(RepositoryOp::Delete, source))
            }
        }
    }

    async fn mutate<V, F, Fut>(
        &self,
        id: TaskId,
        operation: RepositoryOp,
        field: Field<V>,
        next: impl FnOnce(&V) -> V,
        call: F,
    ) -> Result<Task, StoreError>
    where
        V: Clone + PartialEq,
        F: FnOnce(V) -> Fut,
        Fut: Future<Output = Result<Task, R::Error>>,
    {
        let (edit, generation) = {
            let mut state = self.lock();
            state.require_identity()?;
            let generation = state.generation;
            let edit = FieldEdit::apply(&mut state.tasks, id, field, next).ok_or(StoreError::NotFound(id))?;
            (edit, generation)
        };
        debug!(%id, %operation, "applied optimistically");

        match call(edit.applied().clone()).await {
            Ok(stored) => {
                let mut state = self.lock();
                if state.generation == generation {
                    reconcile(&mut state.tasks, stored.clone());
                    state.last_error = None;
                }
                Ok(stored)
            }
            Err(err) => {
                let source: anyhow::Error = err.into();
                let mut state = self.lock();
                if state.generation == generation {
                    let outcome = edit.revert(&mut state.tasks);
                    state.last_error = Some(format!("{operation}: {source:#}"));
                    drop(state);
                    warn!(%id, %operation, ?outcome, error = %source, "backend rejected change; rolled back");
                }
                Err(StoreError::repository(operation, source))
            }
        }
    }

    fn fail(&self, generation: u64, operation: RepositoryOp, source: anyhow::Error) -> StoreError {
        let mut state = self.lock();
        if state.generation == generation {
            state.last_error = Some(format!("{operation}: {source:#}"));
        }
        drop(state);
        warn!(%operation, error = %source, "backend call failed");
        StoreError::repository(operation, source)
    }

    /// Snapshot of the collection, newest first.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Run `f` against the collection without cloning it.
    pub fn with_tasks<T>(&self, f: impl FnOnce(&[Task]) -> T) -> T {
        f(&self.lock().tasks)
    }

    /// One task by id.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|task| task.id == id).cloned()
    }

    /// Number of tasks held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// True when no tasks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// Current auth gate state.
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.lock().session.clone()
    }

    /// Progress of the latest load.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lock().status.clone()
    }

    /// Message of the most recent failure, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Offset used for day and month bucketing.
    #[must_use]
    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// The backing repository.
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Per-month totals over the collection, oldest month first.
    #[must_use]
    pub fn monthly_stats(&self) -> Vec<MonthlyStat> {
        self.with_tasks(|tasks| monthly_stats(tasks, self.offset))
    }

    /// The newest `months` monthly entries.
    #[must_use]
    pub fn dashboard(&self, months: usize) -> DashboardWindow {
        recent_months(&self.monthly_stats(), months)
    }

    /// Totals for tasks created on `day`.
    #[must_use]
    pub fn daily_stats(&self, day: Date) -> DailyStats {
        self.with_tasks(|tasks| daily_stats(tasks, day, self.offset))
    }

    /// Totals for the day containing `now`.
    #[must_use]
    pub fn today_stats(&self, now: OffsetDateTime) -> DailyStats {
        self.with_tasks(|tasks| today_stats(tasks, now, self.offset))
    }

    /// Totals over the whole collection.
    #[must_use]
    pub fn overall_stats(&self) -> CompletionStats {
        self.with_tasks(|tasks| CompletionStats::tally(tasks))
    }

    /// Whether anything was created on `day`.
    #[must_use]
    pub fn has_task_on(&self, day: Date) -> bool {
        self.with_tasks(|tasks| has_task_on(tasks, day, self.offset))
    }

    /// Tasks created on `day`, in collection order.
    #[must_use]
    pub fn tasks_on(&self, day: Date) -> Vec<Task> {
        self.with_tasks(|tasks| tasks_on(tasks, day, self.offset).into_iter().cloned().collect())
    }

    /// Tasks created on `day`, oldest first.
    #[must_use]
    pub fn tasks_on_sorted(&self, day: Date) -> Vec<Task> {
        self.with_tasks(|tasks| {
            tasks_on_sorted(tasks, day, self.offset)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Calendar grid for `month` with task markers.
    #[must_use]
    pub fn month_grid(&self, month: MonthKey) -> MonthGrid {
        self.with_tasks(|tasks| MonthGrid::with_markers(month, tasks, self.offset))
    }

    /// Pending and completed tasks, each in collection order.
    #[must_use]
    pub fn partition(&self) -> (Vec<Task>, Vec<Task>) {
        self.with_tasks(|tasks| {
            let TaskPartition { pending, completed } = partition_by_completion(tasks);
            (
                pending.into_iter().cloned().collect(),
                completed.into_iter().cloned().collect(),
            )
        })
    }
}

fn dedup_ids(tasks: &mut Vec<Task>) {
    let mut seen = HashSet::new();
    let before = tasks.len();
    tasks.retain(|task| seen.insert(task.id));
    if tasks.len() != before {
        warn!(dropped = before - tasks.len(), "backend returned duplicate task ids");
    }
}

fn upsert(tasks: &mut Vec<Task>, task: Task) {
    match tasks.iter().position(|existing| existing.id == task.id) {
        Some(index) => tasks[index] = task,
        None => {
            let index = ordered_position(tasks, &task);
            tasks.insert(index, task);
        }
    }
}

/// Swap in the stored row; `created_at` is immutable so the local one stays.
fn reconcile(tasks: &mut [Task], mut stored: Task) {
    let Some(local) = tasks.iter_mut().find(|task| task.id == stored.id) else {
        return;
    };
    if local.created_at.is_some() && stored.created_at != local.created_at {
        debug!(id = %stored.id, "backend row reports a different created_at; keeping local");
    }
    stored.created_at = local.created_at.or(stored.created_at);
    *local = stored;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn task(id: i64, created: OffsetDateTime) -> Task {
        Task::new(TaskId(id), format!("task {id}"), Some(created))
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut tasks = vec![
            task(1, datetime!(2024-01-02 00:00 UTC)),
            task(2, datetime!(2024-01-01 00:00 UTC)),
            Task::new(TaskId(1), "dup", None),
        ];
        dedup_ids(&mut tasks);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].text, "task 1");
    }

    #[test]
    fn upsert_inserts_in_order_or_replaces() {
        let mut tasks = vec![task(2, datetime!(2024-01-02 00:00 UTC)), task(1, datetime!(2024-01-01 00:00 UTC))];
        upsert(&mut tasks, task(3, datetime!(2024-01-03 00:00 UTC)));
        assert_eq!(tasks[0].id, TaskId(3));

        upsert(&mut tasks, task(2, datetime!(2024-01-02 00:00 UTC)).with_completed(true));
        assert_eq!(tasks.len(), 3);
        assert!(tasks[1].completed);
    }

    #[test]
    fn reconcile_keeps_local_created_at() {
        let created = datetime!(2024-01-02 00:00 UTC);
        let mut tasks = vec![task(1, created)];
        let mut stored = task(1, datetime!(2030-01-01 00:00 UTC)).with_completed(true);
        stored.text = "server text".to_owned();
        reconcile(&mut tasks, stored);
        assert_eq!(tasks[0].created_at, Some(created));
        assert!(tasks[0].completed);
        assert_eq!(tasks[0].text, "server text");
    }
}
