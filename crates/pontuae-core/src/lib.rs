//! Client library for the Pontuae habit tracker.
//!
//! The pieces fit together as follows: a [`CredentialStore`] holds the token
//! pair, a [`Session`] logs in and renews it, and an [`ApiClient`] sends every
//! call through the [`RequestPipeline`], which retries once after renewal.

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod stats;

pub use api::{ApiClient, ApiError, ApiRequest, RequestPipeline, ValidationError};
pub use auth::{
    AuthError, CredentialPair, CredentialStore, RenewError, Session, SessionEvent, SessionState,
};
pub use config::Config;
pub use dashboard::{MonthlyHistory, WeekBoard};
