use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{Duration, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::config::{Config, StorageKind};

use super::credentials::KeyringStorage;
use super::storage::{FileStorage, MemoryStorage, StoredSession, TokenStorage};

/// Snapshot of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub token: Option<String>,
    pub present: bool,
}

/// Owner of the authentication token.
///
/// Shared by reference (`Arc<SessionStore>`) with every component that needs
/// the token. Only the submission service installs tokens; the guard and
/// logout only clear them. Persistence failures are logged, the in-memory
/// state still changes so the process behaves consistently.
pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
    current: RwLock<Option<StoredSession>>,
}

impl SessionStore {
    /// Open a store over `storage`, picking up any token persisted by an
    /// earlier run.
    pub fn open(storage: Box<dyn TokenStorage>) -> Self {
        let current = match storage.load() {
            Ok(loaded) => {
                debug!(has_token = loaded.is_some(), "Session loaded");
                loaded
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session, starting logged out");
                None
            }
        };
        Self {
            storage,
            current: RwLock::new(current),
        }
    }

    /// Store with no persistence, starting empty
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryStorage::new()))
    }

    /// Open the store backend selected by the configuration
    pub fn from_config(config: &Config) -> Result<Arc<Self>> {
        let storage: Box<dyn TokenStorage> = match config.storage {
            StorageKind::File => Box::new(FileStorage::new(config.data_dir()?)),
            StorageKind::Keyring => Box::new(KeyringStorage::new()),
            StorageKind::Memory => Box::new(MemoryStorage::new()),
        };
        Ok(Arc::new(Self::open(storage)))
    }

    /// Install a freshly issued token
    pub fn set(&self, token: &str) {
        let session = StoredSession::new(token);
        if let Err(e) = self.storage.save(&session) {
            warn!(error = %e, "Failed to persist session");
        }
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        info!("Session token installed");
    }

    pub fn get(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Evict the token. Clearing an empty store does nothing.
    pub fn clear(&self) {
        let previous = self.current.write().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_none() {
            return;
        }
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Failed to remove persisted session");
        }
        info!("Session token cleared");
    }

    /// Evict the token only if it is still `token`. Returns whether it was
    /// removed; a token installed in the meantime is left alone.
    pub fn clear_if(&self, token: &str) -> bool {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            match current.as_ref() {
                Some(session) if session.token == token => {
                    current.take();
                }
                _ => return false,
            }
        }
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Failed to remove persisted session");
        }
        info!("Session token cleared");
        true
    }

    pub fn is_present(&self) -> bool {
        self.current.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn session(&self) -> Session {
        let token = self.get();
        Session {
            present: token.is_some(),
            token,
        }
    }

    /// How long ago the current token was installed
    pub fn age(&self) -> Option<Duration> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| Utc::now() - s.issued_at)
    }

    /// `Authorization: Bearer <token>`, or no headers when logged out
    pub fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.get() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored token is not a valid header value"),
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let store = SessionStore::in_memory();
        assert!(store.get().is_none());
        assert!(!store.is_present());

        store.set("t");
        assert_eq!(store.get().as_deref(), Some("t"));
        assert!(store.is_present());
        assert_eq!(
            store.session(),
            Session {
                token: Some("t".to_string()),
                present: true
            }
        );
    }

    #[test]
    fn test_clear_empties_store_and_header() {
        let store = SessionStore::in_memory();
        store.set("t");
        store.clear();
        assert!(store.get().is_none());
        assert!(store.auth_header().is_empty());
        assert_eq!(store.session(), Session::default());

        // Idempotent on an empty store
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_clear_if_spares_newer_token() {
        let store = SessionStore::in_memory();
        store.set("new");
        assert!(!store.clear_if("old"));
        assert_eq!(store.get().as_deref(), Some("new"));

        assert!(store.clear_if("new"));
        assert!(!store.is_present());
        assert!(!store.clear_if("new"));
    }

    #[test]
    fn test_auth_header_carries_bearer_token() {
        let store = SessionStore::in_memory();
        store.set("abc.def.ghi");
        let headers = store.auth_header();
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc.def.ghi")
        );
    }

    #[test]
    fn test_invalid_header_token_yields_empty_headers() {
        let store = SessionStore::in_memory();
        store.set("bad\ntoken");
        assert!(store.auth_header().is_empty());
    }

    #[test]
    fn test_open_loads_persisted_token() {
        let store = SessionStore::open(Box::new(MemoryStorage::with_token("persisted")));
        assert_eq!(store.get().as_deref(), Some("persisted"));
        assert!(store.age().is_some());
    }

    #[test]
    fn test_token_survives_reopen_with_file_storage() {
        let dir = tempfile::tempdir().expect("tempdir");

        let store = SessionStore::open(Box::new(FileStorage::new(dir.path().to_path_buf())));
        store.set("tok1");
        drop(store);

        let reopened = SessionStore::open(Box::new(FileStorage::new(dir.path().to_path_buf())));
        assert_eq!(reopened.get().as_deref(), Some("tok1"));

        reopened.clear();
        let again = SessionStore::open(Box::new(FileStorage::new(dir.path().to_path_buf())));
        assert!(again.get().is_none());
    }
}
