//! Score arithmetic shared by the dashboard and the monthly history.
//!
//! A task scores `min(progress / goal, 1) * 10`. A week's average is the mean
//! task score over tasks with a positive goal, and its points are that average
//! times ten, rounded. A month sums weekly points and averages the weekly
//! averages of weeks that had any tasks.

use chrono::{Datelike, NaiveDate};

use crate::models::Task;

/// Highest score a single task can reach.
pub const MAX_TASK_SCORE: f64 = 10.0;

/// Weeks shown in the monthly history.
pub const WEEKS_PER_MONTH: u32 = 5;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn task_score(progress: i32, weekly_goal: i32) -> f64 {
    if weekly_goal <= 0 {
        return 0.0;
    }
    let ratio = f64::from(progress.max(0)) / f64::from(weekly_goal);
    ratio.min(1.0) * MAX_TASK_SCORE
}

pub fn progress_percent(progress: i32, weekly_goal: i32) -> f64 {
    if weekly_goal <= 0 {
        return 0.0;
    }
    f64::from(progress) / f64::from(weekly_goal) * 100.0
}

/// Week of the month for `date`, counting weeks that start on Sunday.
pub fn week_of_month(date: NaiveDate) -> u32 {
    let offset = date
        .with_day(1)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0);
    (date.day() + offset).div_ceil(7)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeeklyStats {
    /// Mean task score, one decimal.
    pub average: f64,
    pub points: u32,
}

impl WeeklyStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let scores: Vec<f64> = tasks
            .iter()
            .filter(|t| t.weekly_goal > 0)
            .map(Task::score)
            .collect();
        if scores.is_empty() {
            return Self::default();
        }
        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        Self {
            average: round1(average),
            points: (average * 10.0).round() as u32,
        }
    }
}

/// One row of the monthly history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekSummary {
    pub week: u32,
    pub task_count: usize,
    pub stats: WeeklyStats,
}

impl WeekSummary {
    pub fn from_tasks(week: u32, tasks: &[Task]) -> Self {
        Self {
            week,
            task_count: tasks.len(),
            stats: WeeklyStats::from_tasks(tasks),
        }
    }

    pub fn empty(week: u32) -> Self {
        Self {
            week,
            task_count: 0,
            stats: WeeklyStats::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthlySummary {
    pub points: u32,
    pub average: f64,
}

impl MonthlySummary {
    pub fn from_weeks(weeks: &[WeekSummary]) -> Self {
        let points = weeks.iter().map(|w| w.stats.points).sum();
        let active: Vec<f64> = weeks
            .iter()
            .filter(|w| w.task_count > 0)
            .map(|w| w.stats.average)
            .collect();
        let average = if active.is_empty() {
            0.0
        } else {
            round1(active.iter().sum::<f64>() / active.len() as f64)
        };
        Self { points, average }
    }
}
