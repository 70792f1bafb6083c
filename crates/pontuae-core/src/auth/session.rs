use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use super::{AuthError, CredentialPair, CredentialStore, RenewError};
use crate::api::pipeline::endpoint_url;
use crate::api::{server_message, ApiClient, ApiError};
use crate::models::{Identity, IdentityUpdate};

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

const LOGIN_FALLBACK: &str = "Login failed";
const REGISTER_FALLBACK: &str = "Could not create account";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Stored credentials have not been checked yet.
    Unknown,
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Renewal failed and the session was cleared; the user must log in again.
    Expired,
}

/// `POST /login` and `POST /user` response.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    name: Option<String>,
    // Some server builds spell it "tokenses".
    #[serde(default, alias = "tokenses")]
    tokens: Option<CredentialPair>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Session manager: owns the identity and drives the credential lifecycle.
pub struct Session {
    http: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    identity: RwLock<Option<Identity>>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    /// Held for the duration of a renewal so concurrent 401s share one.
    renewal: Mutex<()>,
}

impl Session {
    pub fn new(store: Arc<CredentialStore>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(http, store, base_url))
    }

    pub fn with_client(http: Client, store: Arc<CredentialStore>, base_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            base_url: base_url.into(),
            store,
            identity: RwLock::new(None),
            state,
            events,
            renewal: Mutex::new(()),
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn credentials(&self) -> Option<CredentialPair> {
        self.store.get()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Receive [`SessionEvent::Expired`] when a renewal ends the session.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let request = LoginRequest { email, password };
        let response: AuthResponse = self
            .post_unauthenticated("login", &request, LOGIN_FALLBACK)
            .await?;
        let tokens = Self::require_tokens(response.tokens)?;

        let identity = Identity {
            name: response.name.unwrap_or_default(),
            email: email.to_string(),
        };
        self.establish(tokens, identity);
        Ok(())
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        let request = RegisterRequest { name, email, password };
        let response: AuthResponse = self
            .post_unauthenticated("user", &request, REGISTER_FALLBACK)
            .await?;
        let tokens = Self::require_tokens(response.tokens)?;

        let identity = Identity {
            name: response
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| name.to_string()),
            email: email.to_string(),
        };
        self.establish(tokens, identity);
        Ok(())
    }

    /// Check stored credentials against `GET /user` and settle the initial state.
    pub async fn restore(&self, api: &ApiClient) -> SessionState {
        if !self.store.has_credentials() {
            debug!("No stored credentials, starting anonymous");
            self.set_state(SessionState::Anonymous);
            return SessionState::Anonymous;
        }

        match api.get_profile().await {
            Ok(profile) => {
                if let Some(tokens) = profile.tokens.filter(CredentialPair::is_complete) {
                    debug!("Profile carried rotated tokens");
                    self.store.set(tokens);
                }
                let email = self
                    .store
                    .email()
                    .or(profile.email)
                    .unwrap_or_default();
                let identity = Identity {
                    name: profile.name.unwrap_or_default(),
                    email,
                };
                self.set_identity(Some(identity));
                self.set_state(SessionState::Authenticated);
                info!("Session restored");
                SessionState::Authenticated
            }
            Err(ApiError::Unauthorized) => {
                info!("Stored session rejected");
                self.logout();
                SessionState::Anonymous
            }
            Err(e) => {
                // Keep the tokens; the next start can try again.
                warn!(error = %e, "Could not verify stored session");
                self.set_identity(None);
                self.set_state(SessionState::Anonymous);
                SessionState::Anonymous
            }
        }
    }

    /// Exchange the refresh token for a new pair. Failure ends the session.
    pub async fn renew(&self) -> Result<CredentialPair, RenewError> {
        let _guard = self.renewal.lock().await;
        self.renew_locked().await
    }

    /// Renew on behalf of a request rejected while carrying `rejected`.
    ///
    /// Callers queue on the renewal lock. If the stored token already differs
    /// from the rejected one, another caller renewed in the meantime and the
    /// fresh pair is returned without a second exchange. An empty store means
    /// a concurrent renewal failed.
    pub(crate) async fn renew_after_rejection(
        &self,
        rejected: Option<&str>,
    ) -> Result<CredentialPair, RenewError> {
        let _guard = self.renewal.lock().await;
        match self.store.get() {
            None => Err(RenewError::NoCredentials),
            Some(current) if Some(current.access_token.as_str()) != rejected => {
                debug!("Token already renewed by a concurrent request");
                Ok(current)
            }
            Some(_) => self.renew_locked().await,
        }
    }

    // logout() and login() do not take the renewal lock, so the pair may be
    // replaced while the exchange is in flight. Only the pair that was
    // exchanged is ever overwritten or expired.
    async fn renew_locked(&self) -> Result<CredentialPair, RenewError> {
        let refresh_token = match self.store.get() {
            Some(current) => current.refresh_token,
            None => return Err(RenewError::NoCredentials),
        };

        match self.exchange_refresh_token(&refresh_token).await {
            Ok(pair) => {
                if self.store.replace_if(&refresh_token, pair.clone()) {
                    info!("Session renewed");
                    Ok(pair)
                } else {
                    debug!("Session changed during renewal, discarding renewed pair");
                    self.store.get().ok_or(RenewError::NoCredentials)
                }
            }
            Err(e) => {
                if self.store.clear_if(&refresh_token) {
                    warn!(error = %e, "Token renewal failed, ending session");
                    self.expire();
                    Err(e)
                } else {
                    debug!(error = %e, "Renewal failed after the session changed");
                    self.store.get().ok_or(e)
                }
            }
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<CredentialPair, RenewError> {
        let url = endpoint_url(&self.base_url, "token/refresh-token");
        debug!(url = %url, "Renewing session");
        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenewError::Rejected(status));
        }
        let pair: CredentialPair = response
            .json()
            .await
            .map_err(|e| RenewError::InvalidResponse(e.to_string()))?;
        if !pair.is_complete() {
            return Err(RenewError::InvalidResponse("empty token".to_string()));
        }
        Ok(pair)
    }

    /// Clear credentials and identity. No network call; idempotent.
    pub fn logout(&self) {
        self.store.clear();
        self.set_identity(None);
        if self.state.send_replace(SessionState::Anonymous) != SessionState::Anonymous {
            info!("Logged out");
        }
    }

    /// Merge profile changes into the identity without touching tokens.
    pub fn update_identity(&self, update: IdentityUpdate) {
        if let Some(ref email) = update.email {
            self.store.set_email(email);
        }
        let mut identity = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        match identity.as_mut() {
            Some(current) => current.merge(update),
            None => debug!("Identity update ignored, no active session"),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn establish(&self, tokens: CredentialPair, identity: Identity) {
        self.store.set(tokens);
        self.store.set_email(&identity.email);
        self.set_identity(Some(identity));
        self.set_state(SessionState::Authenticated);
        info!("Session established");
    }

    /// End a session whose credentials were just cleared by a failed renewal.
    fn expire(&self) {
        self.logout();
        // No receivers is fine.
        let _ = self.events.send(SessionEvent::Expired);
    }

    fn set_identity(&self, identity: Option<Identity>) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn require_tokens(tokens: Option<CredentialPair>) -> Result<CredentialPair, AuthError> {
        tokens
            .filter(CredentialPair::is_complete)
            .ok_or_else(|| AuthError::InvalidResponse("tokens missing".to_string()))
    }

    async fn post_unauthenticated<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, AuthError> {
        let url = endpoint_url(&self.base_url, path);
        debug!(url = %url, "Sending authentication request");
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_message(&body).unwrap_or_else(|| fallback.to_string());
            debug!(status = %status, "Authentication rejected");
            return Err(AuthError::Rejected(message));
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}
