//! Local login session: a single JSON record on disk.
//!
//! The guard is a convenience gate in front of protected commands. The
//! backend does its own authorisation.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;
use shared::{
    domain::UserRole,
    protocol::{Credentials, SessionUser},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{DataFetcher, FetchError};

pub const LOGIN_PATH: &str = "/users/validate/";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Not logged in. Run `login` first.")]
    NoSession,
    #[error("Stored session was unreadable and has been cleared. Please log in again.")]
    Corrupt,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Already logged in as {name} ({role}). Run `logout` first.")]
    AlreadyLoggedIn { name: String, role: UserRole },
    #[error("{0}")]
    Rejected(String),
    #[error("Error: {0}")]
    Status(String),
    #[error("Login failed. Please check your connection or try again later.")]
    Unreachable,
    #[error(transparent)]
    Storage(#[from] SessionError),
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw stored text, `None` when nothing usable is stored.
    fn read(&self) -> Result<Option<String>, SessionError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Parsed session; unparseable data reads as `Ok(None)` after being
    /// removed.
    pub fn load(&self) -> Result<Option<SessionUser>, SessionError> {
        let Some(raw) = self.read()? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "session: corrupt record removed");
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, user: &SessionUser) -> Result<(), SessionError> {
        let encoded = serde_json::to_string_pretty(user)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, encoded).map_err(|source| SessionError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Returns whether a session file was removed.
    pub fn clear(&self) -> Result<bool, SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SessionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Admits the caller only when a well-formed session is stored.
    pub fn guard(&self) -> Result<SessionUser, GuardError> {
        let raw = match self.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err(GuardError::NoSession),
            Err(err) => {
                warn!(error = %err, "session: unreadable");
                return Err(GuardError::NoSession);
            }
        };
        serde_json::from_str(&raw).map_err(|err| {
            warn!(path = %self.path.display(), error = %err, "session: corrupt record removed");
            if let Err(err) = self.clear() {
                warn!(error = %err, "session: could not remove corrupt record");
            }
            GuardError::Corrupt
        })
    }
}

pub fn welcome(user: &SessionUser) -> String {
    format!("Welcome, {} ({})", user.name, user.role)
}

/// Validates credentials against the backend and stores the returned user.
pub async fn login(
    fetcher: &dyn DataFetcher,
    store: &SessionStore,
    credentials: &Credentials,
) -> Result<SessionUser, LoginError> {
    if let Some(existing) = store.load()? {
        return Err(LoginError::AlreadyLoggedIn {
            name: existing.name,
            role: existing.role,
        });
    }

    let body = serde_json::to_value(credentials).map_err(SessionError::from)?;
    let record = fetcher
        .post_json(LOGIN_PATH, &body)
        .await
        .map_err(login_failure)?;

    let mut user: SessionUser =
        serde_json::from_value(Value::Object(record.into_map())).map_err(|err| {
            warn!(error = %err, "session: login response missing user fields");
            LoginError::Unreachable
        })?;
    if user.username.is_none() {
        user.username = Some(credentials.username.clone());
    }
    store.save(&user)?;
    info!(name = %user.name, role = %user.role, "session: logged in");
    Ok(user)
}

fn login_failure(err: FetchError) -> LoginError {
    match err.status() {
        Some(401) => LoginError::Rejected(
            err.detail()
                .unwrap_or("Invalid username or password.")
                .to_string(),
        ),
        Some(_) => LoginError::Status(err.status_line().unwrap_or_default()),
        None => LoginError::Unreachable,
    }
}

/// Returns whether a session was stored.
pub fn logout(store: &SessionStore) -> Result<bool, SessionError> {
    let removed = store.clear()?;
    if removed {
        info!("session: logged out");
    }
    Ok(removed)
}
