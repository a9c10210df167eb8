//! Domain types and pure derived views for todo-sync.
//!
//! Nothing in this crate performs I/O. Aggregations take the task slice and an
//! explicit [`time::UtcOffset`] so results never depend on process-wide state.

/// Day-level grouping and the month grid.
pub mod calendar;
/// Identifier types.
pub mod id;
/// Completion statistics.
pub mod stats;
/// The task record and list helpers.
pub mod task;
/// `created_at` parsing and day arithmetic.
pub mod timestamp;

pub use calendar::{DayBuckets, DayCell, MonthGrid, day_buckets, has_task_on, tasks_on, tasks_on_sorted};
pub use id::{TaskId, UserId};
pub use stats::{
    CompletionStats, DailyStats, DashboardWindow, MonthKey, MonthlyStat, daily_stats, monthly_stats,
    recent_months, today_stats,
};
pub use task::{EmptyText, Task, TaskPartition, normalize_text, partition_by_completion, sort_newest_first};
