//! Aggregate views over a user's todos.
//!
//! The in-memory adapter computes these directly from entities with the
//! functions below; the Postgres adapter computes the same numbers in SQL.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::domain::entities::Todo;
use crate::domain::value_objects::{Priority, TodoStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoStatistics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    pub overdue: u64,
    pub due_today: u64,
    pub due_this_week: u64,
    pub completed_today: u64,
    /// Percentage of completed todos, `0.0` when there are none.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProductivity {
    pub period_days: i64,
    pub total_created: u64,
    pub total_completed: u64,
    pub completion_rate: f64,
    pub avg_time_to_complete_hours: f64,
    pub most_productive_day: Option<String>,
    pub most_used_tags: Vec<TagCount>,
}

/// Half-open window `[start, end)` covering the UTC day of `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Half-open window from the start of today through the next seven days.
pub fn week_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (start, _) = day_bounds(now);
    (start, start + Duration::days(7))
}

pub fn completion_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

/// Zero-filled counters keyed by every status.
pub fn empty_status_counts() -> BTreeMap<String, u64> {
    TodoStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect()
}

/// Zero-filled counters keyed by every priority.
pub fn empty_priority_counts() -> BTreeMap<String, u64> {
    Priority::ALL
        .iter()
        .map(|p| (p.as_str().to_string(), 0))
        .collect()
}

fn within(value: Option<DateTime<Utc>>, (start, end): (DateTime<Utc>, DateTime<Utc>)) -> bool {
    matches!(value, Some(v) if v >= start && v < end)
}

impl TodoStatistics {
    pub fn compute<'a>(todos: impl IntoIterator<Item = &'a Todo>, now: DateTime<Utc>) -> Self {
        let today = day_bounds(now);
        let week = week_bounds(now);
        let mut stats = TodoStatistics {
            total: 0,
            by_status: empty_status_counts(),
            by_priority: empty_priority_counts(),
            overdue: 0,
            due_today: 0,
            due_this_week: 0,
            completed_today: 0,
            completion_rate: 0.0,
        };

        for todo in todos {
            stats.total += 1;
            *stats
                .by_status
                .entry(todo.status().as_str().to_string())
                .or_default() += 1;
            *stats
                .by_priority
                .entry(todo.priority().as_str().to_string())
                .or_default() += 1;
            if todo.is_overdue_at(now) {
                stats.overdue += 1;
            }
            if within(todo.due_date(), today) {
                stats.due_today += 1;
            }
            if within(todo.due_date(), week) {
                stats.due_this_week += 1;
            }
            if within(todo.completed_at(), today) {
                stats.completed_today += 1;
            }
        }

        let completed = stats
            .by_status
            .get(TodoStatus::Completed.as_str())
            .copied()
            .unwrap_or(0);
        stats.completion_rate = completion_rate(completed, stats.total);
        stats
    }
}

/// Tag usage ordered by count (descending) then tag name.
pub fn popular_tags<'a>(todos: impl IntoIterator<Item = &'a Todo>, limit: usize) -> Vec<TagCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for todo in todos {
        for tag in todo.tags() {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let mut tags: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags.truncate(limit);
    tags
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

impl UserProductivity {
    pub const TOP_TAGS: usize = 5;

    /// Productivity over todos created within the last `period_days`.
    /// `todos` may contain older entries; they are skipped.
    pub fn compute<'a>(
        todos: impl IntoIterator<Item = &'a Todo>,
        period_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let since = now - Duration::days(period_days);
        let created: Vec<&Todo> = todos
            .into_iter()
            .filter(|t| t.created_at() >= since)
            .collect();

        let completed: Vec<&Todo> = created
            .iter()
            .copied()
            .filter(|t| t.status() == TodoStatus::Completed)
            .collect();

        let hours: Vec<f64> = completed
            .iter()
            .filter_map(|t| t.completed_at().map(|done| done - t.created_at()))
            .map(|elapsed| elapsed.num_seconds().max(0) as f64 / 3600.0)
            .collect();
        let avg_time_to_complete_hours = if hours.is_empty() {
            0.0
        } else {
            hours.iter().sum::<f64>() / hours.len() as f64
        };

        let mut per_day: BTreeMap<u32, (Weekday, u64)> = BTreeMap::new();
        for todo in &completed {
            if let Some(done) = todo.completed_at() {
                let day = done.weekday();
                per_day
                    .entry(day.num_days_from_monday())
                    .or_insert((day, 0))
                    .1 += 1;
            }
        }
        // Ties resolve to the earliest weekday.
        let most_productive_day = per_day
            .values()
            .fold(None::<(Weekday, u64)>, |best, &(day, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((day, count)),
            })
            .map(|(day, _)| weekday_name(day).to_string());

        let total_created = created.len() as u64;
        let total_completed = completed.len() as u64;
        UserProductivity {
            period_days,
            total_created,
            total_completed,
            completion_rate: completion_rate(total_completed, total_created),
            avg_time_to_complete_hours,
            most_productive_day,
            most_used_tags: popular_tags(created.iter().copied(), Self::TOP_TAGS),
        }
    }
}
