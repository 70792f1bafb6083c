//! In-process stand-in for the Pontuae REST API.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use pontuae_core::{ApiClient, CredentialPair, CredentialStore, Session};

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "secret1";

#[derive(Debug, Clone)]
pub struct MockTask {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub weekly_goal: i32,
    pub progress: i32,
    pub week: u32,
}

impl MockTask {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "description": self.description,
            "weeklyGoal": self.weekly_goal,
            "progress": self.progress,
            "category": "Health",
            "startDate": "2026-10-12",
            "weekOfMonth": self.week,
            "isCompleted": self.progress >= self.weekly_goal,
        })
    }
}

#[derive(Default)]
pub struct MockApi {
    access: Mutex<String>,
    refresh: Mutex<String>,
    issued: AtomicUsize,
    next_id: AtomicUsize,
    tasks: Mutex<Vec<MockTask>>,
    pub refresh_calls: AtomicUsize,
    pub task_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
    pub reject_all: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub seen_auth: Mutex<Vec<Option<String>>>,
    pub profile_tokens: Mutex<Option<CredentialPair>>,
}

impl MockApi {
    fn issue(&self) -> CredentialPair {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let pair = CredentialPair::new(format!("A{n}"), format!("R{n}"));
        *self.access.lock().unwrap() = pair.access_token.clone();
        *self.refresh.lock().unwrap() = pair.refresh_token.clone();
        pair
    }

    /// Issue the first pair (A1, R1) as if the user had logged in earlier.
    pub fn issue_initial(&self) -> CredentialPair {
        self.issue()
    }

    /// Reject the current access token while keeping the refresh token valid.
    pub fn expire_access(&self) {
        *self.access.lock().unwrap() = "expired".to_string();
    }

    /// Reject both tokens.
    pub fn revoke_all(&self) {
        self.expire_access();
        *self.refresh.lock().unwrap() = "revoked".to_string();
    }

    pub fn add_task(&self, week: u32, title: &str, weekly_goal: i32, progress: i32) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.tasks.lock().unwrap().push(MockTask {
            id,
            title: title.to_string(),
            description: String::new(),
            weekly_goal,
            progress,
            week,
        });
        id
    }

    pub fn task(&self, id: i64) -> Option<MockTask> {
        self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    pub fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        let expected = format!("Bearer {}", self.access.lock().unwrap());
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }
}

pub struct MockServer {
    pub api: Arc<MockApi>,
    pub base_url: String,
}

impl MockServer {
    pub async fn start() -> Self {
        let api = Arc::new(MockApi::default());
        let routes = Router::new()
            .route("/login", post(login))
            .route("/user", get(profile).post(register).put(update_profile))
            .route("/user/change-password", put(change_password))
            .route("/token/refresh-token", post(refresh))
            .route("/tasks", get(list_tasks))
            .route("/task", post(create_task))
            .route("/task/{id}", get(get_task).put(update_task).delete(delete_task))
            .route("/task/{id}/progress", put(increment))
            .route("/task/{id}/progress/decrement", put(decrement))
            .with_state(Arc::clone(&api));
        let app = Router::new().nest("/api", routes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self {
            api,
            base_url: format!("http://{addr}/api"),
        }
    }

    /// Session and client over a fresh in-memory store.
    pub fn client(&self) -> (Arc<Session>, ApiClient) {
        self.client_with_store(Arc::new(CredentialStore::in_memory()))
    }

    pub fn client_with_store(&self, store: Arc<CredentialStore>) -> (Arc<Session>, ApiClient) {
        let session = Arc::new(Session::new(store, self.base_url.clone()).expect("session"));
        let api = ApiClient::new(Arc::clone(&session));
        (session, api)
    }
}

fn json_response(status: StatusCode, value: Value) -> Response {
    (status, Json(value)).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    json_response(status, json!({ "errors": [message] }))
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Token expired")
}

async fn login(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let pair = api.issue();
        json_response(
            StatusCode::OK,
            json!({ "name": "Ana", "tokens": { "accessToken": pair.access_token, "refreshToken": pair.refresh_token } }),
        )
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL {
        return error(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let pair = api.issue();
    // The name is not echoed back.
    json_response(
        StatusCode::CREATED,
        json!({ "tokens": { "accessToken": pair.access_token, "refreshToken": pair.refresh_token } }),
    )
}

async fn profile(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.profile_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(&headers) {
        return unauthorized();
    }
    let rotated = api.profile_tokens.lock().unwrap().take();
    match rotated {
        Some(pair) => {
            *api.access.lock().unwrap() = pair.access_token.clone();
            *api.refresh.lock().unwrap() = pair.refresh_token.clone();
            json_response(
                StatusCode::OK,
                json!({ "name": "Ana", "tokens": { "accessToken": pair.access_token, "refreshToken": pair.refresh_token } }),
            )
        }
        None => json_response(StatusCode::OK, json!({ "name": "Ana" })),
    }
}

async fn update_profile(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Response {
    api.write_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn change_password(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.write_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(&headers) {
        return unauthorized();
    }
    if body["password"] != PASSWORD {
        return error(StatusCode::BAD_REQUEST, "Current password is incorrect");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn refresh(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = api.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let valid = *api.refresh.lock().unwrap() == body["refreshToken"].as_str().unwrap_or_default();
    if api.fail_refresh.load(Ordering::SeqCst) || !valid {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let pair = api.issue();
    json_response(
        StatusCode::OK,
        json!({ "accessToken": pair.access_token, "refreshToken": pair.refresh_token }),
    )
}

async fn list_tasks(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    api.task_calls.fetch_add(1, Ordering::SeqCst);
    api.seen_auth.lock().unwrap().push(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    if !api.authorized(&headers) {
        return unauthorized();
    }
    let week: Option<u32> = params.get("weekOfMonth").and_then(|w| w.parse().ok());
    if week == Some(99) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
    }
    let tasks: Vec<Value> = api
        .tasks
        .lock()
        .unwrap()
        .iter()
        .filter(|t| week.map(|w| w == t.week).unwrap_or(true))
        .map(MockTask::to_json)
        .collect();
    json_response(StatusCode::OK, Value::Array(tasks))
}

async fn create_task(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.write_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(&headers) {
        return unauthorized();
    }
    let title = body["title"].as_str().unwrap_or_default().to_string();
    let goal = body["weeklyGoal"].as_i64().unwrap_or_default() as i32;
    let id = api.add_task(1, &title, goal, 0);
    if let Some(task) = api.tasks.lock().unwrap().iter_mut().find(|t| t.id == id) {
        task.description = body["description"].as_str().unwrap_or_default().to_string();
    }
    json_response(StatusCode::CREATED, json!({ "id": id, "title": title }))
}

async fn get_task(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !api.authorized(&headers) {
        return unauthorized();
    }
    match api.task(id) {
        Some(task) => json_response(StatusCode::OK, task.to_json()),
        None => error(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn update_task(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    api.write_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(&headers) {
        return unauthorized();
    }
    let mut tasks = api.tasks.lock().unwrap();
    match tasks.iter_mut().find(|t| t.id == id) {
        Some(task) => {
            task.title = body["title"].as_str().unwrap_or_default().to_string();
            task.weekly_goal = body["weeklyGoal"].as_i64().unwrap_or_default() as i32;
            task.description = body["description"].as_str().unwrap_or_default().to_string();
            StatusCode::NO_CONTENT.into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn delete_task(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    api.write_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(&headers) {
        return unauthorized();
    }
    let mut tasks = api.tasks.lock().unwrap();
    let before = tasks.len();
    tasks.retain(|t| t.id != id);
    if tasks.len() == before {
        return error(StatusCode::NOT_FOUND, "Task not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn increment(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    step(&api, &headers, id, 1)
}

async fn decrement(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    step(&api, &headers, id, -1)
}

fn step(api: &MockApi, headers: &HeaderMap, id: i64, delta: i32) -> Response {
    api.write_calls.fetch_add(1, Ordering::SeqCst);
    if !api.authorized(headers) {
        return unauthorized();
    }
    let mut tasks = api.tasks.lock().unwrap();
    let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
        return error(StatusCode::NOT_FOUND, "Task not found");
    };
    let next = task.progress + delta;
    if next < 0 {
        return error(StatusCode::CONFLICT, "Progress cannot go below zero");
    }
    if next > task.weekly_goal {
        return error(StatusCode::CONFLICT, "Weekly goal already reached");
    }
    task.progress = next;
    StatusCode::NO_CONTENT.into_response()
}
