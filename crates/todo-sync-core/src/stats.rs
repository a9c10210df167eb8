//! Completion statistics over a task collection.
//!
//! Every function here is a pure read of its input: the same slice always
//! yields the same output, regardless of the order the tasks arrive in.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::{Date, Month, OffsetDateTime, UtcOffset};

use crate::task::Task;
use crate::timestamp::{day_bounds, local_day};

/// Year-month bucket key, ordered chronologically and printed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u8,
}

impl MonthKey {
    /// Key for a calendar year and month.
    #[must_use]
    pub const fn new(year: i32, month: Month) -> Self {
        Self {
            year,
            month: month as u8,
        }
    }

    /// Key of the month containing `day`.
    #[must_use]
    pub const fn of(day: Date) -> Self {
        Self::new(day.year(), day.month())
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Calendar month.
    #[must_use]
    pub fn month(self) -> Month {
        Month::try_from(self.month).unwrap_or(Month::January)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Failure to read a `YYYY-MM` key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month key: {0} (expected YYYY-MM)")]
pub struct MonthKeyParseError(String);

impl FromStr for MonthKey {
    type Err = MonthKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MonthKeyParseError(s.to_owned());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        let month = Month::try_from(month).map_err(|_| invalid())?;
        Ok(Self::new(year, month))
    }
}

impl Serialize for MonthKey {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `round(completed / total * 100)`, or 0 for an empty bucket.
///
/// Halves round up, matching how the dashboard has always displayed rates.
#[must_use]
pub const fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = if completed > total { total } else { completed };
    #[allow(clippy::cast_possible_truncation)]
    let rate = ((completed * 200 + total) / (total * 2)) as u8;
    rate
}

/// Counts shared by the daily and monthly views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    /// Number of tasks in the bucket.
    pub total: usize,
    /// Tasks marked completed.
    pub completed: usize,
    /// `total - completed`.
    pub incomplete: usize,
    /// Percentage of completed tasks, 0..=100.
    pub completion_rate: u8,
}

impl CompletionStats {
    /// Tally a group of tasks.
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Counts::default();
        for task in tasks {
            counts.add(task);
        }
        counts.finish()
    }

    /// True when the bucket holds no task.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Alias used by the "today" view, where incomplete tasks are pending.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.incomplete
    }
}

#[derive(Default)]
struct Counts {
    total: usize,
    completed: usize,
}

impl Counts {
    const fn add(&mut self, task: &Task) {
        self.total += 1;
        if task.completed {
            self.completed += 1;
        }
    }

    const fn finish(&self) -> CompletionStats {
        CompletionStats {
            total: self.total,
            completed: self.completed,
            incomplete: self.total - self.completed,
            completion_rate: completion_rate(self.completed, self.total),
        }
    }
}

/// Aggregate for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStat {
    /// Bucket key.
    pub month: MonthKey,
    /// Tasks created during the month.
    pub total: usize,
    /// Completed tasks among them.
    pub completed: usize,
    /// `total - completed`.
    pub incomplete: usize,
    /// Percentage completed, 0..=100.
    pub completion_rate: u8,
}

impl MonthlyStat {
    const fn from_stats(month: MonthKey, stats: CompletionStats) -> Self {
        Self {
            month,
            total: stats.total,
            completed: stats.completed,
            incomplete: stats.incomplete,
            completion_rate: stats.completion_rate,
        }
    }
}

/// Bucket tasks by creation month in `offset`, ascending by month.
///
/// Tasks without a usable `created_at` are left out.
#[must_use]
pub fn monthly_stats(tasks: &[Task], offset: UtcOffset) -> Vec<MonthlyStat> {
    let mut buckets: BTreeMap<MonthKey, Counts> = BTreeMap::new();
    for task in tasks {
        let Some(day) = task.created_day(offset) else {
            continue;
        };
        buckets.entry(MonthKey::of(day)).or_default().add(task);
    }
    buckets
        .into_iter()
        .map(|(month, counts)| MonthlyStat::from_stats(month, counts.finish()))
        .collect()
}

/// Aggregate for a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Day the figures describe.
    pub day: Date,
    /// Figures for that day.
    #[serde(flatten)]
    pub stats: CompletionStats,
}

/// Figures for tasks created within `[start_of_day, end_of_day]` of `day`.
#[must_use]
pub fn daily_stats(tasks: &[Task], day: Date, offset: UtcOffset) -> DailyStats {
    let (start, end) = day_bounds(day, offset);
    let stats = CompletionStats::tally(
        tasks
            .iter()
            .filter(|task| task.created_at.is_some_and(|ts| ts >= start && ts <= end)),
    );
    DailyStats { day, stats }
}

/// Figures for the local day containing `now`.
#[must_use]
pub fn today_stats(tasks: &[Task], now: OffsetDateTime, offset: UtcOffset) -> DailyStats {
    daily_stats(tasks, local_day(now, offset), offset)
}

/// Slice of the monthly series shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardWindow {
    /// Most recent months, oldest first.
    pub months: Vec<MonthlyStat>,
}

impl DashboardWindow {
    /// Newest month in the window.
    #[must_use]
    pub fn latest(&self) -> Option<&MonthlyStat> {
        self.months.last()
    }

    /// True when there is nothing to chart.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

/// Keep the `count` most recent entries of an ascending monthly series.
#[must_use]
pub fn recent_months(stats: &[MonthlyStat], count: usize) -> DashboardWindow {
    let skip = stats.len().saturating_sub(count);
    DashboardWindow {
        months: stats[skip..].to_vec(),
    }
}
