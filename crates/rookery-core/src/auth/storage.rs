//! Durable session persistence backends.
//!
//! The token store takes its storage as an explicit dependency, so the
//! production backends here can be swapped for [`MemoryStorage`] in tests
//! or headless tools.

use std::collections::VecDeque;
use std::path::PathBuf;

use keyring::Entry;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use super::store::PersistedSession;

/// Session file name inside the storage directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name for persisted sessions
const SERVICE_NAME: &str = "rookery";

/// Keychain account under which the session blob is stored
const SESSION_ACCOUNT: &str = "session";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session storage I/O failure: {0}")]
    Io(String),

    #[error("Session data could not be encoded or decoded: {0}")]
    Codec(String),

    #[error("OS keychain failure: {0}")]
    Keychain(String),
}

/// Where the token store persists the session between runs.
///
/// Implementations are synchronous; writes are small and the store calls
/// them outside its locks.
pub trait SessionStorage: Send + Sync {
    /// Load the persisted session, or `None` when nothing was stored.
    fn load(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// Replace the persisted session.
    fn store(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Remove any persisted session. Clearing an empty backend succeeds.
    fn clear(&self) -> Result<(), StorageError>;
}

// ============================================================================
// File storage
// ============================================================================

/// Persists the session as pretty-printed JSON under a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Storage rooted at the platform config directory,
    /// e.g. `~/.config/rookery` on Linux.
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| StorageError::Io("Could not find config directory".to_string()))?
            .join(crate::config::APP_NAME);
        Ok(Self::new(dir))
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read session file: {e}")))?;
        let session = serde_json::from_str(&contents)
            .map_err(|e| StorageError::Codec(format!("Failed to parse session file: {e}")))?;
        debug!(path = %path.display(), "Session loaded from disk");
        Ok(Some(session))
    }

    fn store(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(format!("Failed to create session directory: {e}")))?;
        }
        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| StorageError::Codec(format!("Failed to serialize session: {e}")))?;
        std::fs::write(&path, contents)
            .map_err(|e| StorageError::Io(format!("Failed to write session file: {e}")))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| StorageError::Io(format!("Failed to remove session file: {e}")))?;
        }
        Ok(())
    }
}

// ============================================================================
// Keychain storage
// ============================================================================

/// Stores the serialized session in the OS keychain.
///
/// Preferred over [`FileStorage`] where a keychain is available: the refresh
/// token is a long-lived secret and should not sit in a plain file.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a separate keychain service name, for side-by-side installs.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Entry::new(&self.service, SESSION_ACCOUNT)
            .map_err(|e| StorageError::Keychain(format!("Failed to create keyring entry: {e}")))
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        match self.entry()?.get_password() {
            Ok(blob) => {
                let session = serde_json::from_str(&blob).map_err(|e| {
                    StorageError::Codec(format!("Failed to parse keychain session: {e}"))
                })?;
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Keychain(format!(
                "Failed to read session from keychain: {e}"
            ))),
        }
    }

    fn store(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let blob = serde_json::to_string(session)
            .map_err(|e| StorageError::Codec(format!("Failed to serialize session: {e}")))?;
        self.entry()?
            .set_password(&blob)
            .map_err(|e| StorageError::Keychain(format!("Failed to store session in keychain: {e}")))
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Keychain(format!(
                "Failed to delete session from keychain: {e}"
            ))),
        }
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Keeps the session in memory only. Nothing survives a restart; used by
/// tests and one-shot tooling.
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<PersistedSession>>,
    /// Errors to inject on upcoming writes, consumed in order.
    write_failures: Mutex<VecDeque<StorageError>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next `store` call.
    pub fn fail_next_write(&self, error: StorageError) {
        self.write_failures.lock().push_back(error);
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        Ok(self.slot.lock().clone())
    }

    fn store(&self, session: &PersistedSession) -> Result<(), StorageError> {
        if let Some(error) = self.write_failures.lock().pop_front() {
            return Err(error);
        }
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }
}
