//! Plain-text renderers for the CLI.

use std::fmt::Write as _;

use time::{OffsetDateTime, UtcOffset};
use todo_sync_core::calendar::WEEKDAYS;
use todo_sync_core::{CompletionStats, DailyStats, DashboardWindow, MonthGrid, Task, partition_by_completion};

const BAR_WIDTH: usize = 20;

fn checkbox(task: &Task) -> &'static str {
    if task.completed { "[x]" } else { "[ ]" }
}

fn short_date(ts: Option<OffsetDateTime>, offset: UtcOffset) -> String {
    ts.map_or_else(|| "----------".to_owned(), |ts| ts.to_offset(offset).date().to_string())
}

fn clock(ts: Option<OffsetDateTime>, offset: UtcOffset) -> String {
    ts.map_or_else(
        || "--:--".to_owned(),
        |ts| {
            let time = ts.to_offset(offset).time();
            format!("{:02}:{:02}", time.hour(), time.minute())
        },
    )
}

fn task_line(out: &mut String, task: &Task, when: &str) {
    let _ = writeln!(out, "{} {:>5}  {}  {}", checkbox(task), task.id, when, task.text);
}

/// Pending tasks, then completed ones, each newest first.
pub fn list(tasks: &[Task], offset: UtcOffset) -> String {
    if tasks.is_empty() {
        return "No tasks yet\n".to_owned();
    }
    let partition = partition_by_completion(tasks);
    let mut out = String::new();
    let _ = writeln!(out, "Pending ({})", partition.pending.len());
    for task in &partition.pending {
        task_line(&mut out, task, &short_date(task.created_at, offset));
    }
    let _ = writeln!(out, "\nCompleted ({})", partition.completed.len());
    for task in &partition.completed {
        task_line(&mut out, task, &short_date(task.created_at, offset));
    }
    out
}

fn bar(rate: u8) -> String {
    let filled = usize::from(rate) * BAR_WIDTH / 100;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// Monthly table with completion bars and the headline figures.
pub fn dashboard(window: &DashboardWindow, overall: &CompletionStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "All tasks: {} total, {} done, {} open ({}%)",
        overall.total, overall.completed, overall.incomplete, overall.completion_rate
    );
    if window.is_empty() {
        out.push_str("No monthly data yet\n");
        return out;
    }
    if let Some(latest) = window.latest() {
        let _ = writeln!(out, "Latest month {}: {}% complete", latest.month, latest.completion_rate);
    }
    out.push('\n');
    let _ = writeln!(out, "Month   | Total | Done | Open | Rate");
    let _ = writeln!(out, "------- | ----- | ---- | ---- | ----");
    for stat in &window.months {
        let _ = writeln!(
            out,
            "{} | {:>5} | {:>4} | {:>4} | {:>3}% {}",
            stat.month,
            stat.total,
            stat.completed,
            stat.incomplete,
            stat.completion_rate,
            bar(stat.completion_rate)
        );
    }
    out
}

fn day_summary(out: &mut String, stats: &DailyStats) {
    let figures = &stats.stats;
    let _ = writeln!(
        out,
        "{}: {} tasks, {} done, {} pending ({}%)",
        stats.day,
        figures.total,
        figures.completed,
        figures.pending(),
        figures.completion_rate
    );
}

/// Summary line plus the day's tasks in creation order.
pub fn day(stats: &DailyStats, tasks: &[Task], offset: UtcOffset) -> String {
    let mut out = String::new();
    day_summary(&mut out, stats);
    if tasks.is_empty() {
        out.push_str("No tasks on this day\n");
        return out;
    }
    for task in tasks {
        task_line(&mut out, task, &clock(task.created_at, offset));
    }
    out
}

/// Sunday-first month grid; `*` marks days with tasks.
pub fn calendar(grid: &MonthGrid) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", grid.month());
    let header: Vec<String> = WEEKDAYS
        .iter()
        .map(|weekday| weekday.to_string().chars().take(2).collect())
        .collect();
    let _ = writeln!(out, "{}", header.join("  "));
    for week in grid.weeks() {
        let cells: Vec<String> = week
            .iter()
            .map(|cell| {
                cell.map_or_else(
                    || "   ".to_owned(),
                    |cell| {
                        let marker = if cell.has_task { '*' } else { ' ' };
                        format!("{:>2}{marker}", cell.date.day())
                    },
                )
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join(" ").trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use time::macros::{date, datetime, offset};
    use todo_sync_core::{MonthKey, TaskId, daily_stats, monthly_stats, recent_months};

    fn sample() -> Vec<Task> {
        vec![
            Task::new(TaskId(3), "ship release", Some(datetime!(2024-02-01 09:30 UTC))).with_completed(true),
            Task::new(TaskId(2), "walk", Some(datetime!(2024-01-20 18:05 UTC))),
            Task::new(TaskId(1), "read", Some(datetime!(2024-01-05 07:00 UTC))).with_completed(true),
        ]
    }

    #[test]
    fn list_groups_pending_before_completed() {
        let out = list(&sample(), offset!(UTC));
        let pending = out.find("Pending (1)").expect("pending header");
        let completed = out.find("Completed (2)").expect("completed header");
        assert!(pending < completed);
        assert!(out.contains("[ ]     2  2024-01-20  walk"));
        assert!(out.contains("[x]     3  2024-02-01  ship release"));
        assert_eq!(list(&[], offset!(UTC)), "No tasks yet\n");
    }

    #[test]
    fn dashboard_shows_rates_and_latest() {
        let tasks = sample();
        let window = recent_months(&monthly_stats(&tasks, offset!(UTC)), 6);
        let out = dashboard(&window, &CompletionStats::tally(&tasks));
        assert!(out.contains("All tasks: 3 total, 2 done, 1 open (67%)"));
        assert!(out.contains("Latest month 2024-02: 100% complete"));
        assert!(out.contains("2024-01 |     2 |    1 |    1 |  50% ##########.........."));
    }

    #[test]
    fn empty_dashboard_says_so() {
        let out = dashboard(&DashboardWindow::default(), &CompletionStats::default());
        assert!(out.contains("No monthly data yet"));
    }

    #[test]
    fn day_view_lists_times_in_offset() {
        let tasks = sample();
        let stats = daily_stats(&tasks, date!(2024 - 01 - 21), offset!(+9));
        let on_day: Vec<Task> = tasks
            .iter()
            .filter(|task| task.created_on(date!(2024 - 01 - 21), offset!(+9)))
            .cloned()
            .collect();
        let out = day(&stats, &on_day, offset!(+9));
        assert!(out.starts_with("2024-01-21: 1 tasks, 0 done, 1 pending (0%)"));
        assert!(out.contains("03:05  walk"));
    }

    #[test]
    fn calendar_marks_days_with_tasks() {
        let month: MonthKey = "2024-01".parse().expect("month");
        let out = calendar(&MonthGrid::with_markers(month, &sample(), offset!(UTC)));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "2024-01");
        assert_eq!(lines[1], "Su  Mo  Tu  We  Th  Fr  Sa");
        assert_eq!(lines[2], "     1   2   3   4   5*  6");
        assert!(lines.iter().any(|line| line.contains("20*")));
        assert_eq!(lines.len(), 7);
    }
}
