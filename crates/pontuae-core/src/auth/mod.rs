//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: login, registration, restore, renewal and logout
//! - `CredentialStore`: the access/refresh token pair, persisted to a file
//!   or the OS keychain

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::{
    CredentialBackend, CredentialPair, CredentialStore, FileBackend, KeyringBackend,
    MemoryBackend, PersistedSession,
};
pub use error::{AuthError, RenewError};
pub use session::{Session, SessionEvent, SessionState};
