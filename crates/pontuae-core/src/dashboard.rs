//! Weekly task board and monthly history.

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{Task, TaskFilter};
use crate::stats::{MonthlySummary, WeekSummary, WeeklyStats, WEEKS_PER_MONTH};

pub const GOAL_REACHED_MESSAGE: &str = "Weekly goal already reached!";
pub const PROGRESS_AT_ZERO_MESSAGE: &str = "Progress is already at zero!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Increment,
    Decrement,
}

impl Step {
    fn conflict_message(self) -> &'static str {
        match self {
            Step::Increment => GOAL_REACHED_MESSAGE,
            Step::Decrement => PROGRESS_AT_ZERO_MESSAGE,
        }
    }
}

/// Tasks of the selected week with their local progress.
#[derive(Debug, Clone)]
pub struct WeekBoard {
    filter: TaskFilter,
    tasks: Vec<Task>,
}

impl WeekBoard {
    /// Board for the week containing `date`, not yet loaded.
    pub fn for_date(date: NaiveDate) -> Self {
        Self::with_tasks(TaskFilter::for_date(date), Vec::new())
    }

    pub fn with_tasks(filter: TaskFilter, tasks: Vec<Task>) -> Self {
        Self { filter, tasks }
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Switch to another week of the same month. Tasks are cleared until reloaded.
    pub fn select_week(&mut self, week: u32) {
        if week != self.filter.week_of_month {
            self.filter.week_of_month = week;
            self.tasks.clear();
        }
    }

    pub fn stats(&self) -> WeeklyStats {
        WeeklyStats::from_tasks(&self.tasks)
    }

    pub async fn load(&mut self, api: &ApiClient) -> Result<&[Task], ApiError> {
        self.tasks = api.list_tasks(&self.filter).await?;
        debug!(count = self.tasks.len(), week = self.filter.week_of_month, "Tasks loaded");
        Ok(&self.tasks)
    }

    /// Add one to a task's progress. At the goal this is a conflict and nothing changes.
    pub async fn increment(&mut self, api: &ApiClient, id: i64) -> Result<&Task, ApiError> {
        self.step(api, id, Step::Increment).await
    }

    /// Take one from a task's progress. At zero this is a conflict and nothing changes.
    pub async fn decrement(&mut self, api: &ApiClient, id: i64) -> Result<&Task, ApiError> {
        self.step(api, id, Step::Decrement).await
    }

    async fn step(&mut self, api: &ApiClient, id: i64, step: Step) -> Result<&Task, ApiError> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("task {}", id)))?;

        let allowed = match step {
            Step::Increment => self.tasks[index].can_increment(),
            Step::Decrement => self.tasks[index].can_decrement(),
        };
        if !allowed {
            return Err(ApiError::Conflict(step.conflict_message().to_string()));
        }

        let result = match step {
            Step::Increment => api.increment_progress(id).await,
            Step::Decrement => api.decrement_progress(id).await,
        };
        match result {
            Ok(()) => {}
            Err(ApiError::Conflict(_)) => {
                return Err(ApiError::Conflict(step.conflict_message().to_string()))
            }
            Err(e) => return Err(e),
        }

        let task = &mut self.tasks[index];
        match step {
            Step::Increment => task.progress += 1,
            Step::Decrement => task.progress -= 1,
        }
        Ok(task)
    }
}

/// Weekly summaries for weeks 1..=5 of a month.
#[derive(Debug, Clone)]
pub struct MonthlyHistory {
    pub month: u32,
    pub year: i32,
    pub weeks: Vec<WeekSummary>,
}

impl MonthlyHistory {
    /// Fetch every week concurrently. A week that fails to load counts as empty.
    pub async fn load(api: &ApiClient, month: u32, year: i32) -> Self {
        let futures = (1..=WEEKS_PER_MONTH).map(|week| {
            let filter = TaskFilter::new(week, month, year);
            async move { (week, api.list_tasks(&filter).await) }
        });
        let results = join_all(futures).await;

        let weeks = results
            .into_iter()
            .map(|(week, result)| match result {
                Ok(tasks) => WeekSummary::from_tasks(week, &tasks),
                Err(e) => {
                    warn!(week, month, year, error = %e, "Failed to load week");
                    WeekSummary::empty(week)
                }
            })
            .collect();

        Self { month, year, weeks }
    }

    pub fn summary(&self) -> MonthlySummary {
        MonthlySummary::from_weeks(&self.weeks)
    }
}
