//! REST API access for the Pontuae service.
//!
//! This module provides the `RequestPipeline`, which attaches the session's
//! bearer token to every call and renews it once on a 401, and the typed
//! `ApiClient` for task and profile endpoints built on top of it.

pub mod client;
pub mod error;
pub mod pipeline;

pub use client::ApiClient;
pub use error::{server_message, ApiError, ValidationError};
pub use pipeline::{ApiRequest, RequestPipeline};
