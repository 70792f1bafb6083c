use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized - session expired or credentials rejected")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Client-side checks that run before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("Weekly goal must be greater than zero")]
    NonPositiveGoal,

    #[error("Name is required")]
    EmptyName,

    #[error("Email is required")]
    EmptyEmail,

    #[error("Current password is required")]
    EmptyPassword,

    #[error("New password is required")]
    EmptyNewPassword,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape returned by the API: `{"errors": ["..."]}`, sometimes `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    message: Option<String>,
}

/// Extract the first human-readable message from an API error body.
pub fn server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .errors
        .into_iter()
        .find(|m| !m.trim().is_empty())
        .or(parsed.message.filter(|m| !m.trim().is_empty()))
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = server_message(body).unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            400 | 422 => ApiError::BadRequest(detail),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            409 => ApiError::Conflict(detail),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, detail)),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }

    /// Short message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(e) => e.to_string(),
            ApiError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            ApiError::Conflict(msg) | ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}
