//! Data models for tasks and user profiles.
//!
//! Wire names are camelCase, matching the API.

pub mod task;
pub mod user;

pub use task::{CreatedTask, Task, TaskDraft, TaskFilter, DEFAULT_WEEKLY_GOAL};
pub use user::{
    validate_registration, Identity, IdentityUpdate, PasswordChange, Profile, ProfileUpdate,
    MIN_PASSWORD_LENGTH,
};
