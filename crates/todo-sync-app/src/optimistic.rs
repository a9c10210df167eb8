//! Snapshot / apply / restore bookkeeping for optimistic mutations.
//!
//! A mutation records what it changed before the remote call starts. If the
//! call fails, the record restores the prior value, but only while the local
//! task still shows the value this mutation wrote.

use std::cmp::Ordering;

use todo_sync_core::task::newest_first;
use todo_sync_core::{Task, TaskId};

/// Result of a rollback attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revert {
    /// Prior value put back.
    Restored,
    /// The task is gone; nothing to restore into.
    Missing,
    /// Another write landed in between; it is left alone.
    Overwritten,
}

/// Accessor for one mutable task field.
pub type Field<V> = fn(&mut Task) -> &mut V;

/// Accessor for [`Task::completed`].
pub fn completed_field(task: &mut Task) -> &mut bool {
    &mut task.completed
}

/// Accessor for [`Task::text`].
pub fn text_field(task: &mut Task) -> &mut String {
    &mut task.text
}

/// A field overwrite applied ahead of remote confirmation.
pub struct FieldEdit<V> {
    id: TaskId,
    field: Field<V>,
    previous: V,
    applied: V,
}

impl<V: Clone + PartialEq> FieldEdit<V> {
    /// Snapshot the field of task `id`, then write `next(&previous)` into it.
    ///
    /// Returns `None` when the task is not in `tasks`.
    pub fn apply(tasks: &mut [Task], id: TaskId, field: Field<V>, next: impl FnOnce(&V) -> V) -> Option<Self> {
        let task = tasks.iter_mut().find(|task| task.id == id)?;
        let slot = field(task);
        let previous = slot.clone();
        let applied = next(&previous);
        slot.clone_from(&applied);
        Some(Self {
            id,
            field,
            previous,
            applied,
        })
    }

    /// Value written locally.
    pub const fn applied(&self) -> &V {
        &self.applied
    }

    /// Value before the write.
    pub const fn previous(&self) -> &V {
        &self.previous
    }

    /// Put the previous value back if the task still carries ours.
    pub fn revert(&self, tasks: &mut [Task]) -> Revert {
        let Some(task) = tasks.iter_mut().find(|task| task.id == self.id) else {
            return Revert::Missing;
        };
        let slot = (self.field)(task);
        if *slot != self.applied {
            return Revert::Overwritten;
        }
        slot.clone_from(&self.previous);
        Revert::Restored
    }
}

/// A task taken out of the collection ahead of remote confirmation.
#[derive(Debug)]
pub struct Removal {
    task: Task,
    index: usize,
}

impl Removal {
    /// Remove task `id`, remembering where it sat.
    pub fn take(tasks: &mut Vec<Task>, id: TaskId) -> Option<Self> {
        let index = tasks.iter().position(|task| task.id == id)?;
        let task = tasks.remove(index);
        Some(Self { task, index })
    }

    /// The removed record.
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// Reinsert at the original position, or wherever keeps newest-first order
    /// if the collection moved on. Never duplicates an id.
    pub fn restore(self, tasks: &mut Vec<Task>) -> Revert {
        if tasks.iter().any(|task| task.id == self.task.id) {
            return Revert::Overwritten;
        }
        let index = if fits_at(tasks, self.index, &self.task) {
            self.index
        } else {
            ordered_position(tasks, &self.task)
        };
        tasks.insert(index, self.task);
        Revert::Restored
    }
}

/// Index at which `task` keeps `tasks` in newest-first order (after equals).
pub fn ordered_position(tasks: &[Task], task: &Task) -> usize {
    tasks.partition_point(|existing| newest_first(existing, task) != Ordering::Greater)
}

fn fits_at(tasks: &[Task], index: usize, task: &Task) -> bool {
    if index > tasks.len() {
        return false;
    }
    let after_prev = index == 0 || newest_first(&tasks[index - 1], task) != Ordering::Greater;
    let before_next = tasks
        .get(index)
        .is_none_or(|next| newest_first(task, next) != Ordering::Greater);
    after_prev && before_next
}
