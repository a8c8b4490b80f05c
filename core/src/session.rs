//! Persisted login state.
//!
//! # Design
//! The whole session lives behind one `RwLock`, and every write replaces it
//! under the write lock. A reader therefore sees either the old session or
//! the new one, never a mix of fields. Writes persist through the
//! `SessionBackend` first and only then swap the in-memory copy, so a failed
//! write leaves both in their previous state.
//!
//! The store never looks at token expiry; see `claims` for that.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::SessionError;
use crate::types::Role;

/// The persisted record. Keys: `token`, `userId`, `email`, `role`,
/// `displayName`, `loggedIn`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub display_name: Option<String>,
    pub logged_in: bool,
}

impl Session {
    pub fn authorization_header_value(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }
}

/// Durable storage for the session record.
pub trait SessionBackend: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Keeps the record in memory only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    stored: Mutex<Option<Session>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.stored.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.stored.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.stored.lock() = None;
        Ok(())
    }
}

/// JSON file on disk.
///
/// Saves write a temp file in the same directory, sync it, rename it over the
/// target and then sync the directory, so after a crash the file holds
/// either the previous record or the new one.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(session)?;
        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(io::Error::from)?;
        if let Err(e) = sync_dir(dir) {
            tracing::debug!(error = %e, dir = %dir.display(), "directory sync failed");
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-wide login state, shared as `Arc<SessionStore>`.
pub struct SessionStore {
    current: RwLock<Session>,
    backend: Box<dyn SessionBackend>,
}

impl SessionStore {
    /// Load the stored session. An unreadable record starts empty.
    pub fn open(backend: impl SessionBackend + 'static) -> Self {
        let current = match backend.load() {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable session record");
                Session::default()
            }
        };
        Self {
            current: RwLock::new(current),
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    /// Record a successful login.
    pub fn start_session(
        &self,
        token: &str,
        user_id: i64,
        email: &str,
        role: Role,
        display_name: &str,
    ) -> Result<(), SessionError> {
        let session = Session {
            token: Some(token.to_string()),
            user_id: Some(user_id),
            email: Some(email.to_string()),
            role: Some(role),
            display_name: Some(display_name.to_string()),
            logged_in: true,
        };
        let mut current = self.current.write();
        self.backend.save(&session)?;
        *current = session;
        tracing::info!(user_id, %role, "session started");
        Ok(())
    }

    /// Forget everything.
    pub fn end_session(&self) -> Result<(), SessionError> {
        let mut current = self.current.write();
        self.backend.clear()?;
        *current = Session::default();
        tracing::info!("session ended");
        Ok(())
    }

    /// Swap the token, keeping identity fields and `logged_in` as they are.
    pub fn update_token(&self, new_token: &str) -> Result<(), SessionError> {
        let mut current = self.current.write();
        let updated = Session {
            token: Some(new_token.to_string()),
            ..current.clone()
        };
        self.backend.save(&updated)?;
        *current = updated;
        tracing::info!("session token replaced");
        Ok(())
    }

    /// Consistent copy of the whole session.
    pub fn snapshot(&self) -> Session {
        self.current.read().clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.current.read().token.clone()
    }

    /// `"Bearer <token>"` when a token is stored.
    pub fn current_authorization_header_value(&self) -> Option<String> {
        self.current.read().authorization_header_value()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.read().logged_in
    }

    pub fn user_id(&self) -> Option<i64> {
        self.current.read().user_id
    }

    pub fn email(&self) -> Option<String> {
        self.current.read().email.clone()
    }

    pub fn role(&self) -> Option<Role> {
        self.current.read().role
    }

    pub fn display_name(&self) -> Option<String> {
        self.current.read().display_name.clone()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
