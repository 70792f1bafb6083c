//! Typed task and profile calls on top of the [`RequestPipeline`].

use std::sync::Arc;

use tracing::{debug, warn};

use super::pipeline::{ApiRequest, RequestPipeline};
use super::ApiError;
use crate::auth::Session;
use crate::models::{CreatedTask, PasswordChange, Profile, ProfileUpdate, Task, TaskDraft, TaskFilter};

/// API client for the Pontuae service.
/// Clone is cheap - the pipeline shares the connection pool and session.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: RequestPipeline,
}

impl ApiClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            pipeline: RequestPipeline::new(session),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.pipeline.session()
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    // ===== Tasks =====

    pub async fn create_task(&self, draft: &TaskDraft) -> Result<CreatedTask, ApiError> {
        draft.validate()?;
        let created: CreatedTask = self
            .pipeline
            .send_json(ApiRequest::post("task").with_json(draft)?)
            .await?;
        debug!(id = created.id, "Task created");
        Ok(created)
    }

    /// Tasks for one week. A body that is not a JSON array yields an empty list.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ApiError> {
        let value: serde_json::Value = self
            .pipeline
            .send_json(ApiRequest::get("tasks").with_query(filter.query()))
            .await?;

        if !value.is_array() {
            warn!("Task list response is not an array");
            return Ok(Vec::new());
        }
        serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse task list: {}", e)))
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, ApiError> {
        self.pipeline
            .send_json(ApiRequest::get(format!("task/{}", id)))
            .await
    }

    pub async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<(), ApiError> {
        draft.validate()?;
        self.pipeline
            .send_empty(ApiRequest::put(format!("task/{}", id)).with_json(draft)?)
            .await
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        self.pipeline
            .send_empty(ApiRequest::delete(format!("task/{}", id)))
            .await
    }

    /// Returns [`ApiError::Conflict`] when the weekly goal is already reached.
    pub async fn increment_progress(&self, id: i64) -> Result<(), ApiError> {
        self.pipeline
            .send_empty(ApiRequest::put(format!("task/{}/progress", id)))
            .await
    }

    /// Returns [`ApiError::Conflict`] when progress is already zero.
    pub async fn decrement_progress(&self, id: i64) -> Result<(), ApiError> {
        self.pipeline
            .send_empty(ApiRequest::put(format!("task/{}/progress/decrement", id)))
            .await
    }

    // ===== User =====

    pub async fn get_profile(&self) -> Result<Profile, ApiError> {
        self.pipeline.send_json(ApiRequest::get("user")).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        update.validate()?;
        self.pipeline
            .send_empty(ApiRequest::put("user").with_json(update)?)
            .await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        change.validate()?;
        self.pipeline
            .send_empty(ApiRequest::put("user/change-password").with_json(change)?)
            .await
    }
}
