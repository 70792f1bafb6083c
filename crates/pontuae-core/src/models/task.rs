use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::api::ValidationError;
use crate::stats;

/// Weekly goal suggested for a new task.
pub const DEFAULT_WEEKLY_GOAL: i32 = 7;

/// A task as returned by `GET /tasks` and `GET /task/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, alias = "Id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weekly_goal: i32,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub week_of_month: Option<u32>,
    #[serde(default)]
    pub is_completed: bool,
}

impl Task {
    /// Score out of 10, capped at the goal.
    pub fn score(&self) -> f64 {
        stats::task_score(self.progress, self.weekly_goal)
    }

    pub fn progress_percent(&self) -> f64 {
        stats::progress_percent(self.progress, self.weekly_goal)
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed || (self.weekly_goal > 0 && self.progress >= self.weekly_goal)
    }

    pub fn can_increment(&self) -> bool {
        self.progress < self.weekly_goal
    }

    pub fn can_decrement(&self) -> bool {
        self.progress > 0
    }

    /// Parse the start date. The API sends `YYYY-MM-DD`; older records use `DD/MM/YYYY`.
    pub fn start_date_parsed(&self) -> Option<NaiveDate> {
        let raw = self.start_date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
            .ok()
    }

    pub fn title_display(&self) -> &str {
        if self.title.trim().is_empty() {
            "(untitled)"
        } else {
            &self.title
        }
    }
}

/// Body for `POST /task` and `PUT /task/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub weekly_goal: i32,
    pub category: String,
    pub start_date: NaiveDate,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, weekly_goal: i32, start_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            weekly_goal,
            category: String::new(),
            start_date,
        }
    }

    /// Prefill a draft from an existing task; the start date moves to `today`.
    pub fn from_task(task: &Task, today: NaiveDate) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            weekly_goal: if task.weekly_goal > 0 {
                task.weekly_goal
            } else {
                DEFAULT_WEEKLY_GOAL
            },
            category: task.category.clone().unwrap_or_default(),
            start_date: today,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.weekly_goal <= 0 {
            return Err(ValidationError::NonPositiveGoal);
        }
        Ok(())
    }
}

/// `POST /task` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedTask {
    #[serde(alias = "Id")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// Week selector for `GET /tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFilter {
    pub week_of_month: u32,
    pub month: u32,
    pub year: i32,
}

impl TaskFilter {
    pub fn new(week_of_month: u32, month: u32, year: i32) -> Self {
        Self {
            week_of_month,
            month,
            year,
        }
    }

    /// The week containing `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        Self::new(stats::week_of_month(date), date.month(), date.year())
    }

    pub fn query(&self) -> Vec<(String, String)> {
        vec![
            ("weekOfMonth".to_string(), self.week_of_month.to_string()),
            ("month".to_string(), self.month.to_string()),
            ("year".to_string(), self.year.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_task_with_missing_fields() {
        let json = r#"{"title":"Read","weeklyGoal":5,"progress":2,"category":"Study","startDate":"2026-10-12","weekOfMonth":3,"isCompleted":false}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, None);
        assert_eq!(task.weekly_goal, 5);
        assert_eq!(task.progress, 2);
        assert_eq!(task.week_of_month, Some(3));
        assert_eq!(task.start_date_parsed(), Some(date(2026, 10, 12)));

        let sparse: Task = serde_json::from_str(r#"{"Id":4}"#).unwrap();
        assert_eq!(sparse.id, Some(4));
        assert_eq!(sparse.weekly_goal, 0);
        assert_eq!(sparse.title_display(), "(untitled)");
    }

    #[test]
    fn test_start_date_day_first_format() {
        let task = Task {
            start_date: Some("05/10/2026".to_string()),
            ..serde_json::from_str::<Task>("{}").unwrap()
        };
        assert_eq!(task.start_date_parsed(), Some(date(2026, 10, 5)));
    }

    #[test]
    fn test_completion_and_bounds() {
        let mut task: Task = serde_json::from_str(r#"{"weeklyGoal":3,"progress":3}"#).unwrap();
        assert!(task.is_completed());
        assert!(!task.can_increment());
        assert!(task.can_decrement());

        task.progress = 0;
        assert!(!task.is_completed());
        assert!(task.can_increment());
        assert!(!task.can_decrement());
    }

    #[test]
    fn test_draft_validation() {
        let today = date(2026, 10, 15);
        assert_eq!(
            TaskDraft::new("   ", 3, today).validate(),
            Err(ValidationError::EmptyTitle)
        );
        assert_eq!(
            TaskDraft::new("Run", 0, today).validate(),
            Err(ValidationError::NonPositiveGoal)
        );
        assert!(TaskDraft::new("Run", 3, today).validate().is_ok());
    }

    #[test]
    fn test_draft_serializes_camel_case_date() {
        let draft = TaskDraft::new("Run", 3, date(2026, 10, 15)).with_category("Health");
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["weeklyGoal"], 3);
        assert_eq!(body["startDate"], "2026-10-15");
        assert_eq!(body["category"], "Health");
    }

    #[test]
    fn test_filter_for_date() {
        // October 2026 starts on a Thursday.
        let filter = TaskFilter::for_date(date(2026, 10, 15));
        assert_eq!(filter, TaskFilter::new(3, 10, 2026));
        assert_eq!(filter.query()[0], ("weekOfMonth".to_string(), "3".to_string()));
    }
}
