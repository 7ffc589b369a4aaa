//! The credential store: single owner of the access/refresh token pair and
//! the signed-in principal.
//!
//! All accessors are synchronous. Reads take a short read lock and see every
//! completed write, so a request dispatched after a renewal settles always
//! picks up the renewed credential. Mutations update memory first, then
//! persist through the injected [`SessionStorage`] before returning.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::principal::Principal;
use super::storage::{SessionStorage, StorageError};

/// Access/refresh token pair, handled as one unit: both present or both
/// absent, never split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// Serialized session blob handed to the storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub tokens: Option<TokenPair>,
    pub principal: Option<Principal>,
    /// When this blob was written; informational only.
    pub saved_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    tokens: Option<TokenPair>,
    principal: Option<Principal>,
}

impl Inner {
    fn snapshot(&self) -> PersistedSession {
        PersistedSession {
            tokens: self.tokens.clone(),
            principal: self.principal.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Holds the current credential pair and principal for the process.
///
/// Directly after a renewal the principal may be stale relative to the fresh
/// tokens; callers that display identity re-fetch the profile (see
/// `ApiClient::fetch_profile`). Tokens-without-principal is a valid state
/// and every accessor handles it.
pub struct TokenStore {
    state: RwLock<Inner>,
    storage: Arc<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            state: RwLock::new(Inner::default()),
            storage,
        }
    }

    /// Hydrate tokens and principal from storage, typically once at startup.
    /// Returns whether a persisted credential pair was found.
    pub fn load(&self) -> Result<bool, StorageError> {
        match self.storage.load()? {
            Some(persisted) => {
                let mut state = self.state.write();
                state.tokens = persisted.tokens;
                state.principal = persisted.principal;
                let found = state.tokens.is_some();
                debug!(restored = found, "Session hydrated from storage");
                Ok(found)
            }
            None => Ok(false),
        }
    }

    /// Current token pair, if any.
    pub fn get(&self) -> Option<TokenPair> {
        self.state.read().tokens.clone()
    }

    /// Bearer value for request attachment, without cloning the refresh half.
    pub fn access_token(&self) -> Option<String> {
        self.state.read().tokens.as_ref().map(|t| t.access.clone())
    }

    /// Whether a credential pair is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.state.read().tokens.is_some()
    }

    /// Replace both tokens as one unit and persist before returning.
    ///
    /// On a storage error the in-memory pair is already updated; the session
    /// keeps working and only durability is lost.
    pub fn set(&self, pair: TokenPair) -> Result<(), StorageError> {
        let snapshot = {
            let mut state = self.state.write();
            state.tokens = Some(pair);
            state.snapshot()
        };
        self.storage.store(&snapshot)
    }

    /// Replace the pair only if `expected_refresh` is still the current
    /// refresh token, persisting when the swap happens. Returns whether it
    /// did.
    ///
    /// A renewal settling after the session was cleared or replaced must
    /// stand down rather than resurrect the old session; the compare and
    /// the swap happen under one write lock.
    pub fn set_if_refresh_matches(
        &self,
        expected_refresh: &str,
        pair: TokenPair,
    ) -> Result<bool, StorageError> {
        let snapshot = {
            let mut state = self.state.write();
            let current = state
                .tokens
                .as_ref()
                .is_some_and(|t| t.refresh == expected_refresh);
            if !current {
                return Ok(false);
            }
            state.tokens = Some(pair);
            state.snapshot()
        };
        self.storage.store(&snapshot)?;
        Ok(true)
    }

    /// Drop tokens and principal together and remove the persisted session.
    pub fn clear(&self) -> Result<(), StorageError> {
        {
            let mut state = self.state.write();
            state.tokens = None;
            state.principal = None;
        }
        self.storage.clear()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state.read().principal.clone()
    }

    /// Replace the stored principal and persist before returning.
    pub fn set_principal(&self, principal: Option<Principal>) -> Result<(), StorageError> {
        let snapshot = {
            let mut state = self.state.write();
            state.principal = principal;
            state.snapshot()
        };
        self.storage.store(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStorage;

    fn store_over(storage: Arc<MemoryStorage>) -> TokenStore {
        TokenStore::new(storage)
    }

    #[test]
    fn test_set_then_get_returns_the_whole_pair() {
        let store = store_over(Arc::new(MemoryStorage::new()));
        assert_eq!(store.get(), None);
        assert!(!store.is_authenticated());

        store.set(TokenPair::new("A1", "R1")).unwrap();
        assert_eq!(store.get(), Some(TokenPair::new("A1", "R1")));
        assert_eq!(store.access_token().as_deref(), Some("A1"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_set_persists_before_returning() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_over(Arc::clone(&storage));
        store.set(TokenPair::new("A1", "R1")).unwrap();

        let persisted = storage.load().unwrap().expect("session persisted");
        assert_eq!(persisted.tokens, Some(TokenPair::new("A1", "R1")));
    }

    #[test]
    fn test_set_if_refresh_matches_swaps_only_while_current() {
        let store = store_over(Arc::new(MemoryStorage::new()));
        store.set(TokenPair::new("A1", "R1")).unwrap();

        assert!(store
            .set_if_refresh_matches("R1", TokenPair::new("A2", "R2"))
            .unwrap());
        assert_eq!(store.get(), Some(TokenPair::new("A2", "R2")));

        // R1 is no longer current, so the stale swap stands down.
        assert!(!store
            .set_if_refresh_matches("R1", TokenPair::new("A3", "R3"))
            .unwrap());
        assert_eq!(store.get(), Some(TokenPair::new("A2", "R2")));
    }

    #[test]
    fn test_set_if_refresh_matches_stands_down_after_clear() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_over(Arc::clone(&storage));
        store.set(TokenPair::new("A1", "R1")).unwrap();
        store.clear().unwrap();

        assert!(!store
            .set_if_refresh_matches("R1", TokenPair::new("A2", "R2"))
            .unwrap());
        assert_eq!(store.get(), None);
        // Nothing was persisted either; the cleared session stays cleared.
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_clear_drops_tokens_principal_and_persisted_blob() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_over(Arc::clone(&storage));
        store.set(TokenPair::new("A1", "R1")).unwrap();
        store
            .set_principal(Some(Principal {
                id: 1,
                name: "Quill".to_string(),
                role: "admin".to_string(),
                email: None,
            }))
            .unwrap();

        store.clear().unwrap();
        assert_eq!(store.get(), None);
        assert_eq!(store.principal(), None);
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_restart_rehydrates_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let store = store_over(Arc::clone(&storage));
            store.set(TokenPair::new("A1", "R1")).unwrap();
            store
                .set_principal(Some(Principal {
                    id: 9,
                    name: "Moss".to_string(),
                    role: "SuperAdmin".to_string(),
                    email: Some("moss@example.net".to_string()),
                }))
                .unwrap();
        }

        let store = store_over(storage);
        assert!(store.load().unwrap());
        assert_eq!(store.get(), Some(TokenPair::new("A1", "R1")));
        assert_eq!(store.principal().unwrap().name, "Moss");
    }

    #[test]
    fn test_tokens_without_principal_is_a_valid_state() {
        let store = store_over(Arc::new(MemoryStorage::new()));
        store.set(TokenPair::new("A1", "R1")).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.principal(), None);
    }

    #[test]
    fn test_storage_failure_keeps_memory_current() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_over(Arc::clone(&storage));
        storage.fail_next_write(StorageError::Io("disk full".to_string()));

        assert!(store.set(TokenPair::new("A1", "R1")).is_err());
        // The pair is still usable for this run.
        assert_eq!(store.get(), Some(TokenPair::new("A1", "R1")));
    }

    #[test]
    fn test_concurrent_readers_never_observe_a_torn_pair() {
        let store = Arc::new(store_over(Arc::new(MemoryStorage::new())));
        store.set(TokenPair::new("access-0", "refresh-0")).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 1..=200 {
                    store
                        .set(TokenPair::new(format!("access-{i}"), format!("refresh-{i}")))
                        .unwrap();
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let pair = store.get().expect("pair present throughout");
                    let access_n = pair.access.strip_prefix("access-").unwrap();
                    let refresh_n = pair.refresh.strip_prefix("refresh-").unwrap();
                    assert_eq!(access_n, refresh_n, "torn read: {pair:?}");
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
