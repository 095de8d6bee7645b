use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use keyring::{error::Error as KeyringError, Entry};
use thiserror::Error;
use tracing::debug;

use crate::errors::{AppError, AppResult};

/// Bearer token issued by the identity provider (the ID token).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

#[derive(Debug, Error, Clone)]
#[error("Secret Service unavailable for account '{account}' (service '{service}'): {message}")]
pub struct SecretServiceError {
    account: String,
    service: String,
    message: String,
}

impl SecretServiceError {
    pub fn new(
        account: impl Into<String>,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Where the session token survives between process invocations.
pub trait TokenBackend: Send + Sync {
    fn load(&self) -> AppResult<Option<SessionToken>>;
    fn save(&self, token: &SessionToken) -> AppResult<()>;
    fn delete(&self) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenBackend {
    slot: Mutex<Option<SessionToken>>,
}

impl MemoryTokenBackend {
    pub fn with_token(token: SessionToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenBackend for MemoryTokenBackend {
    fn load(&self) -> AppResult<Option<SessionToken>> {
        Ok(lock(&self.slot).clone())
    }

    fn save(&self, token: &SessionToken) -> AppResult<()> {
        *lock(&self.slot) = Some(token.clone());
        Ok(())
    }

    fn delete(&self) -> AppResult<()> {
        *lock(&self.slot) = None;
        Ok(())
    }
}

/// Persists the token in the OS Secret Service, one entry per OAuth client.
#[derive(Debug, Clone)]
pub struct KeyringTokenBackend {
    service: String,
    account: String,
}

impl KeyringTokenBackend {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, SecretServiceError> {
        Entry::new(&self.service, &self.account).map_err(|err| {
            SecretServiceError::new(
                &self.account,
                &self.service,
                format!("failed to create keyring entry: {err}"),
            )
        })
    }

    fn error(&self, err: &KeyringError) -> SecretServiceError {
        SecretServiceError::new(&self.account, &self.service, describe_keyring_error(err))
    }
}

impl TokenBackend for KeyringTokenBackend {
    fn load(&self) -> AppResult<Option<SessionToken>> {
        match self.entry()?.get_password() {
            Ok(secret) if secret.trim().is_empty() => Ok(None),
            Ok(secret) => Ok(Some(SessionToken::new(secret.trim()))),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(self.error(&err).into()),
        }
    }

    fn save(&self, token: &SessionToken) -> AppResult<()> {
        self.entry()?
            .set_password(token.as_str())
            .map_err(|err| self.error(&err).into())
    }

    fn delete(&self) -> AppResult<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(self.error(&err).into()),
        }
    }
}

/// Sole owner of the session token. Starts absent, is set once per
/// successful code exchange and cleared on logout.
pub struct CredentialStore {
    backend: Box<dyn TokenBackend>,
    current: RwLock<Option<SessionToken>>,
}

impl CredentialStore {
    /// An absent store that persists nothing beyond the process.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryTokenBackend::default()),
            current: RwLock::new(None),
        }
    }

    /// Initialise from whatever the backend persisted; absent if nothing was.
    pub fn load(backend: impl TokenBackend + 'static) -> AppResult<Self> {
        let current = backend.load()?;
        debug!(target: "credentials", present = current.is_some(), "loaded session token");
        Ok(Self {
            backend: Box::new(backend),
            current: RwLock::new(current),
        })
    }

    pub fn set_token(&self, token: SessionToken) -> AppResult<()> {
        self.backend.save(&token)?;
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        debug!(target: "credentials", "session token stored");
        Ok(())
    }

    pub fn get_token(&self) -> Option<SessionToken> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The persisted copy goes first; if that fails the session is kept so
    /// memory and storage never disagree.
    pub fn clear(&self) -> AppResult<()> {
        self.backend.delete()?;
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        debug!(target: "credentials", "session token cleared");
        Ok(())
    }

    pub fn require_token(&self) -> AppResult<SessionToken> {
        self.get_token().ok_or(AppError::Unauthenticated)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.get_token().is_some())
            .finish()
    }
}

/// Shared handle passed to every component that needs the token.
pub type SharedCredentials = Arc<CredentialStore>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn describe_keyring_error(err: &KeyringError) -> String {
    match err {
        KeyringError::NoStorageAccess(inner) => {
            format!("Secret Service locked or unavailable: {inner}")
        }
        KeyringError::PlatformFailure(inner) => {
            format!("Secret Service platform failure: {inner}")
        }
        KeyringError::TooLong(attr, limit) => {
            format!("Secret Service attribute '{attr}' exceeded platform limit {limit}")
        }
        KeyringError::Invalid(attr, reason) => {
            format!("Secret Service attribute {attr} invalid: {reason}")
        }
        KeyringError::Ambiguous(items) => format!(
            "Secret Service returned {} matching credentials for the token entry",
            items.len()
        ),
        KeyringError::BadEncoding(_) => {
            "Secret Service returned a non-UTF8 secret for the token entry".into()
        }
        KeyringError::NoEntry => "Secret Service reported no entry".into(),
        _ => format!("Secret Service error: {err}"),
    }
}
