//! Day-level lookup over a task collection for the calendar view.

use std::collections::{BTreeMap, BTreeSet};

use time::{Date, Month, UtcOffset, Weekday};

use crate::stats::MonthKey;
use crate::task::Task;

/// True iff some task was created on `day` in `offset`.
#[must_use]
pub fn has_task_on(tasks: &[Task], day: Date, offset: UtcOffset) -> bool {
    tasks.iter().any(|task| task.created_on(day, offset))
}

/// Tasks created on `day`, in input order.
#[must_use]
pub fn tasks_on(tasks: &[Task], day: Date, offset: UtcOffset) -> Vec<&Task> {
    tasks.iter().filter(|task| task.created_on(day, offset)).collect()
}

/// Tasks created on `day`, oldest first (the day detail listing).
#[must_use]
pub fn tasks_on_sorted(tasks: &[Task], day: Date, offset: UtcOffset) -> Vec<&Task> {
    let mut found = tasks_on(tasks, day, offset);
    found.sort_by_key(|task| task.created_at);
    found
}

/// Tasks grouped by local creation day.
pub type DayBuckets<'a> = BTreeMap<Date, Vec<&'a Task>>;

/// Group tasks by creation day; tasks without a timestamp are dropped.
#[must_use]
pub fn day_buckets(tasks: &[Task], offset: UtcOffset) -> DayBuckets<'_> {
    let mut buckets = DayBuckets::new();
    for task in tasks {
        if let Some(day) = task.created_day(offset) {
            buckets.entry(day).or_default().push(task);
        }
    }
    buckets
}

/// One filled cell of the month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    /// Calendar date of the cell.
    pub date: Date,
    /// Whether a marker should be drawn.
    pub has_task: bool,
}

/// Sunday-first week rows for one month; `None` cells pad the first and last week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    month: MonthKey,
    weeks: Vec<[Option<DayCell>; 7]>,
}

impl MonthGrid {
    /// Lay out `month` without markers.
    #[must_use]
    pub fn new(month: MonthKey) -> Self {
        Self::build(month, &BTreeSet::new())
    }

    /// Lay out `month`, marking days that have at least one task.
    #[must_use]
    pub fn with_markers(month: MonthKey, tasks: &[Task], offset: UtcOffset) -> Self {
        let marked: BTreeSet<Date> = tasks.iter().filter_map(|task| task.created_day(offset)).collect();
        Self::build(month, &marked)
    }

    fn build(month: MonthKey, marked: &BTreeSet<Date>) -> Self {
        let days = month_days(month);
        let lead = days
            .first()
            .map_or(0, |first| usize::from(first.weekday().number_days_from_sunday()));

        let mut weeks = Vec::new();
        let mut week: [Option<DayCell>; 7] = [None; 7];
        let mut slot = lead;
        for date in days {
            if slot == 7 {
                weeks.push(week);
                week = [None; 7];
                slot = 0;
            }
            week[slot] = Some(DayCell {
                date,
                has_task: marked.contains(&date),
            });
            slot += 1;
        }
        weeks.push(week);

        Self { month, weeks }
    }

    /// Month shown by the grid.
    #[must_use]
    pub const fn month(&self) -> MonthKey {
        self.month
    }

    /// Week rows, Sunday first.
    #[must_use]
    pub fn weeks(&self) -> &[[Option<DayCell>; 7]] {
        &self.weeks
    }

    /// Filled cells in date order.
    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flatten().flatten()
    }

    /// Grid for the preceding month.
    #[must_use]
    pub fn previous(&self) -> Self {
        Self::new(previous_month(self.month))
    }

    /// Grid for the following month.
    #[must_use]
    pub fn next(&self) -> Self {
        Self::new(next_month(self.month))
    }
}

/// Column headers matching [`MonthGrid::weeks`].
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sunday,
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
];

fn month_days(month: MonthKey) -> Vec<Date> {
    let Ok(first) = Date::from_calendar_date(month.year(), month.month(), 1) else {
        return Vec::new();
    };
    std::iter::successors(Some(first), |day| day.next_day())
        .take_while(|day| day.month() == first.month())
        .collect()
}

/// Month before `month`.
#[must_use]
pub fn previous_month(month: MonthKey) -> MonthKey {
    match month.month() {
        Month::January => MonthKey::new(month.year() - 1, Month::December),
        other => MonthKey::new(month.year(), other.previous()),
    }
}

/// Month after `month`.
#[must_use]
pub fn next_month(month: MonthKey) -> MonthKey {
    match month.month() {
        Month::December => MonthKey::new(month.year() + 1, Month::January),
        other => MonthKey::new(month.year(), other.next()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::id::TaskId;
    use crate::timestamp::parse_created_at;
    use time::macros::{date, offset};

    fn task(id: i64, created: Option<&str>) -> Task {
        Task::new(TaskId(id), format!("task {id}"), created.and_then(parse_created_at))
    }

    fn sample() -> Vec<Task> {
        vec![
            task(1, Some("2024-01-05")),
            task(2, Some("2024-01-20")).with_completed(true),
            task(3, Some("2024-02-01")).with_completed(true),
        ]
    }

    #[test]
    fn has_task_on_matches_calendar_day() {
        let tasks = sample();
        assert!(has_task_on(&tasks, date!(2024 - 01 - 05), offset!(UTC)));
        assert!(!has_task_on(&tasks, date!(2024 - 01 - 06), offset!(UTC)));
        assert!(!has_task_on(&[], date!(2024 - 01 - 05), offset!(UTC)));
    }

    #[test]
    fn missing_timestamps_are_ignored() {
        let tasks = vec![task(1, None), task(2, Some("garbage")), task(3, Some("2024-01-05"))];
        let found = tasks_on(&tasks, date!(2024 - 01 - 05), offset!(UTC));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, TaskId(3));
        assert_eq!(day_buckets(&tasks, offset!(UTC)).len(), 1);
    }

    #[test]
    fn tasks_on_is_stable_with_input_order() {
        let tasks = vec![
            task(5, Some("2024-01-05T18:00:00Z")),
            task(2, Some("2024-01-05T07:00:00Z")),
            task(9, Some("2024-01-05T12:00:00Z")),
        ];
        let ids: Vec<i64> = tasks_on(&tasks, date!(2024 - 01 - 05), offset!(UTC))
            .iter()
            .map(|t| t.id.0)
            .collect();
        assert_eq!(ids, vec![5, 2, 9]);

        let sorted: Vec<i64> = tasks_on_sorted(&tasks, date!(2024 - 01 - 05), offset!(UTC))
            .iter()
            .map(|t| t.id.0)
            .collect();
        assert_eq!(sorted, vec![2, 9, 5]);
    }

    #[test]
    fn day_buckets_group_by_local_day() {
        let tasks = vec![
            task(1, Some("2024-01-05T10:00:00Z")),
            task(2, Some("2024-01-05T16:00:00Z")),
            task(3, Some("2024-01-06T01:00:00Z")),
        ];
        let utc = day_buckets(&tasks, offset!(UTC));
        assert_eq!(utc[&date!(2024 - 01 - 05)].len(), 2);
        assert_eq!(utc[&date!(2024 - 01 - 06)].len(), 1);

        let tokyo = day_buckets(&tasks, offset!(+9));
        assert_eq!(tokyo[&date!(2024 - 01 - 05)].len(), 1);
        assert_eq!(tokyo[&date!(2024 - 01 - 06)].len(), 2);
    }

    #[test]
    fn month_grid_starts_on_sunday_and_pads() {
        // January 2024 starts on a Monday and has 31 days.
        let month: MonthKey = "2024-01".parse().unwrap();
        let grid = MonthGrid::with_markers(month, &sample(), offset!(UTC));
        let weeks = grid.weeks();
        assert_eq!(weeks.len(), 5);
        assert!(weeks[0][0].is_none());
        assert_eq!(weeks[0][1].map(|cell| cell.date), Some(date!(2024 - 01 - 01)));
        assert_eq!(weeks[4][3].map(|cell| cell.date), Some(date!(2024 - 01 - 31)));
        assert!(weeks[4][4].is_none());
        assert_eq!(grid.days().count(), 31);

        let marked: Vec<Date> = grid.days().filter(|cell| cell.has_task).map(|cell| cell.date).collect();
        assert_eq!(marked, vec![date!(2024 - 01 - 05), date!(2024 - 01 - 20)]);
    }

    #[test]
    fn month_grid_handles_leap_february() {
        let grid = MonthGrid::new("2024-02".parse().unwrap());
        assert_eq!(grid.days().count(), 29);
        assert!(grid.days().all(|cell| !cell.has_task));
    }

    #[test]
    fn navigation_wraps_years() {
        let jan: MonthKey = "2024-01".parse().unwrap();
        assert_eq!(previous_month(jan).to_string(), "2023-12");
        assert_eq!(next_month("2023-12".parse().unwrap()), jan);
        assert_eq!(MonthGrid::new(jan).next().month().to_string(), "2024-02");
        assert_eq!(MonthGrid::new(jan).previous().month().to_string(), "2023-12");
    }
}
