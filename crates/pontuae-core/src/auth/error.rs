use reqwest::StatusCode;
use thiserror::Error;

use crate::api::ValidationError;

/// Failure of login or registration. The message is what the user sees.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unable to reach server: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Failure to exchange the refresh token. Always ends the session.
#[derive(Error, Debug)]
pub enum RenewError {
    #[error("No stored credentials to renew")]
    NoCredentials,

    #[error("Refresh token rejected ({0})")]
    Rejected(StatusCode),

    #[error("Network error during renewal: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid renewal response: {0}")]
    InvalidResponse(String),
}
