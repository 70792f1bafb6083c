//! Access/refresh token storage.
//!
//! The in-memory copy is authoritative for the running process. Every change
//! is written through to a [`CredentialBackend`] so a restart picks it up
//! again. Persistence failures are logged and never surfaced.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Session file name in the data directory
pub const SESSION_FILE: &str = "session.json";

/// Keychain service name for the keyring backend
const SERVICE_NAME: &str = "pontuae";

/// Keychain account holding the serialized session
const KEYRING_ACCOUNT: &str = "session";

/// Access token plus the refresh token it was issued with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

// Tokens stay out of logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// On-disk shape, keyed under fixed names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl PersistedSession {
    fn from_state(state: &StoreState) -> Self {
        Self {
            access_token: state.pair.as_ref().map(|p| p.access_token.clone()),
            refresh_token: state.pair.as_ref().map(|p| p.refresh_token.clone()),
            user_email: state.email.clone(),
        }
    }

    /// A pair is only restored when both halves are present.
    fn into_state(self) -> StoreState {
        let pair = match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) => {
                Some(CredentialPair::new(access, refresh)).filter(CredentialPair::is_complete)
            }
            (None, None) => None,
            _ => {
                warn!("Stored session has only one token, ignoring it");
                None
            }
        };
        StoreState {
            pair,
            email: self.user_email,
        }
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_email.is_none()
    }
}

/// Where the credentials live between runs.
pub trait CredentialBackend: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>>;
    fn save(&self, session: &PersistedSession) -> Result<()>;
    fn erase(&self) -> Result<()>;
}

/// JSON file written via temp file + rename so both tokens land together.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let session = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path).context("Failed to replace session file")?;
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// OS keychain entry holding the serialized session as a single secret.
pub struct KeyringBackend {
    account: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self {
            account: KEYRING_ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBackend for KeyringBackend {
    fn load(&self) -> Result<Option<PersistedSession>> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(
                serde_json::from_str(&secret).context("Failed to parse keychain session")?,
            )),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        let secret = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")
    }

    fn erase(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}

/// Process-local backend. Clones share the same slot, which lets tests
/// simulate a restart by opening a second store over the same backend.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<PersistedSession>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<Option<PersistedSession>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    pair: Option<CredentialPair>,
    email: Option<String>,
}

/// Token pair and email, held in memory and mirrored to a backend.
///
/// Writes persist while holding the write lock, so backend I/O blocks the
/// calling thread. Backends are a small local file or one keychain entry.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    state: RwLock<StoreState>,
}

impl CredentialStore {
    /// Open a store, loading whatever the backend already holds.
    pub fn open(backend: impl CredentialBackend + 'static) -> Self {
        let state = match backend.load() {
            Ok(Some(persisted)) => persisted.into_state(),
            Ok(None) => StoreState::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load stored credentials");
                StoreState::default()
            }
        };
        debug!(has_credentials = state.pair.is_some(), "Credential store opened");
        Self {
            backend: Box::new(backend),
            state: RwLock::new(state),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    pub fn get(&self) -> Option<CredentialPair> {
        self.read().pair.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().pair.as_ref().map(|p| p.access_token.clone())
    }

    pub fn has_credentials(&self) -> bool {
        self.read().pair.is_some()
    }

    /// Replace both tokens at once.
    pub fn set(&self, pair: CredentialPair) {
        let mut state = self.write();
        state.pair = Some(pair);
        self.persist(&state);
    }

    /// Swap in `pair` only while the stored refresh token is still `expected_refresh`.
    ///
    /// Returns false, leaving the store untouched, when a logout or a new
    /// login replaced the pair after `expected_refresh` was read.
    pub fn replace_if(&self, expected_refresh: &str, pair: CredentialPair) -> bool {
        let mut state = self.write();
        let current = state.pair.as_ref().map(|p| p.refresh_token.as_str());
        if current != Some(expected_refresh) {
            return false;
        }
        state.pair = Some(pair);
        self.persist(&state);
        true
    }

    /// Remove both tokens and the stored email. Idempotent.
    pub fn clear(&self) {
        let mut state = self.write();
        self.erase(&mut state);
    }

    /// [`clear`](Self::clear), but only while the stored refresh token is
    /// still `expected_refresh`. Returns whether anything was cleared.
    pub fn clear_if(&self, expected_refresh: &str) -> bool {
        let mut state = self.write();
        let current = state.pair.as_ref().map(|p| p.refresh_token.as_str());
        if current != Some(expected_refresh) {
            return false;
        }
        self.erase(&mut state);
        true
    }

    pub fn email(&self) -> Option<String> {
        self.read().email.clone()
    }

    pub fn set_email(&self, email: &str) {
        let mut state = self.write();
        state.email = Some(email.to_string());
        self.persist(&state);
    }

    fn erase(&self, state: &mut StoreState) {
        state.pair = None;
        state.email = None;
        if let Err(e) = self.backend.erase() {
            warn!(error = %e, "Failed to erase stored credentials");
        }
    }

    // Called with the write lock held so disk order matches memory order.
    fn persist(&self, state: &StoreState) {
        let persisted = PersistedSession::from_state(state);
        let result = if persisted.is_empty() {
            self.backend.erase()
        } else {
            self.backend.save(&persisted)
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist credentials");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
