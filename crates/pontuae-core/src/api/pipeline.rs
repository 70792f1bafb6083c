//! Authenticated request pipeline.
//!
//! Every API call goes through [`RequestPipeline::send`]. The current access
//! token is attached as a bearer header; a 401 triggers one renewal through
//! the [`Session`] and one resend. A request that was already retried is never
//! renewed again, and transport errors never count as authorization failures.

use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::Session;

/// Join a base URL and an endpoint path with exactly one slash.
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Describes one API call so it can be sent again after a renewal.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Set once the request has been resent after a renewal.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Clone is cheap - the HTTP client and the session are shared.
#[derive(Clone)]
pub struct RequestPipeline {
    client: Client,
    base_url: String,
    session: Arc<Session>,
}

impl RequestPipeline {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            client: session.http_client().clone(),
            base_url: session.base_url().to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send a request, renewing the session once if the server answers 401.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        let token = self.session.credentials().map(|c| c.access_token);
        let response = self.dispatch(&request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }
        if request.retried {
            debug!(path = %request.path, "Still unauthorized after renewal");
            return Err(ApiError::Unauthorized);
        }

        request.retried = true;
        let renewed = match self.session.renew_after_rejection(token.as_deref()).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(path = %request.path, error = %e, "Session renewal failed");
                return Err(ApiError::Unauthorized);
            }
        };

        debug!(path = %request.path, "Retrying request with renewed token");
        let response = self.dispatch(&request, Some(&renewed.access_token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path = %request.path, "Still unauthorized after renewal");
            return Err(ApiError::Unauthorized);
        }
        Self::check_response(response).await
    }

    /// Send and decode a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// Send a request whose success response carries no useful body.
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = endpoint_url(&self.base_url, &request.path);
        debug!(
            method = %request.method,
            url = %url,
            authenticated = token.is_some(),
            retried = request.retried,
            "Sending API request"
        );

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_single_slash() {
        assert_eq!(endpoint_url("http://h/api/", "/tasks"), "http://h/api/tasks");
        assert_eq!(endpoint_url("http://h/api", "task/3"), "http://h/api/task/3");
    }

    #[test]
    fn test_request_builders() {
        let req = ApiRequest::put("task/1/progress");
        assert_eq!(req.method, Method::PUT);
        assert!(!req.retried);
        assert!(req.body.is_none());

        let req = ApiRequest::post("task")
            .with_json(&serde_json::json!({"title": "Run"}))
            .unwrap();
        assert_eq!(req.body, Some(serde_json::json!({"title": "Run"})));
    }
}
