//! Session artifact persistence
//!
//! Stores the cookie set and local-storage snapshot captured after a fresh
//! sign-in so later runs can skip the credential flow. The store is a
//! capability handed to the session manager, which lets tests run against an
//! in-memory implementation.

use crate::cdp::types::Cookie;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Persisted authentication artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionArtifacts {
    /// Browser cookie set
    pub cookies: Vec<Cookie>,
    /// Flat local-storage snapshot
    pub storage: HashMap<String, String>,
}

/// Session artifact store
///
/// No locking is provided; at most one automation process may use a given
/// store location at a time.
pub trait SessionStore: Send + Sync {
    /// Load previously saved artifacts, if any
    fn load(&self) -> Result<Option<SessionArtifacts>>;

    /// Persist artifacts, replacing any previous ones
    fn save(&self, artifacts: &SessionArtifacts) -> Result<()>;

    /// Delete persisted artifacts
    fn clear(&self) -> Result<()>;
}

/// Filesystem-backed store: cookies.json + storage.json under one directory
pub struct FsSessionStore {
    cookie_file: PathBuf,
    storage_file: PathBuf,
}

impl FsSessionStore {
    /// Create a store rooted at `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            cookie_file: dir.join("cookies.json"),
            storage_file: dir.join("storage.json"),
        }
    }
}

impl SessionStore for FsSessionStore {
    fn load(&self) -> Result<Option<SessionArtifacts>> {
        let cookie_json = match std::fs::read_to_string(&self.cookie_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cookies: Vec<Cookie> = match serde_json::from_str(&cookie_json) {
            Ok(cookies) => cookies,
            Err(e) => {
                // A corrupt file is treated as absent; the credential fallback
                // rewrites it after the next successful sign-in
                warn!("Discarding unreadable cookie file: {}", e);
                return Ok(None);
            }
        };

        let storage = match std::fs::read_to_string(&self.storage_file) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };

        debug!(
            "Loaded session artifacts: {} cookies, {} storage entries",
            cookies.len(),
            storage.len()
        );

        Ok(Some(SessionArtifacts { cookies, storage }))
    }

    fn save(&self, artifacts: &SessionArtifacts) -> Result<()> {
        if let Some(dir) = self.cookie_file.parent() {
            std::fs::create_dir_all(dir)?;
        }

        std::fs::write(&self.cookie_file, serde_json::to_string(&artifacts.cookies)?)?;
        std::fs::write(&self.storage_file, serde_json::to_string(&artifacts.storage)?)?;

        debug!(
            "Saved session artifacts: {} cookies, {} storage entries",
            artifacts.cookies.len(),
            artifacts.storage.len()
        );

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        for file in [&self.cookie_file, &self.storage_file] {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<SessionArtifacts>>,
}

impl MemorySessionStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with artifacts
    pub fn with_artifacts(artifacts: SessionArtifacts) -> Self {
        Self {
            inner: Mutex::new(Some(artifacts)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionArtifacts>> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
        Ok(inner.clone())
    }

    fn save(&self, artifacts: &SessionArtifacts) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
        *inner = Some(artifacts.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
        *inner = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_artifacts() -> SessionArtifacts {
        SessionArtifacts {
            cookies: vec![Cookie {
                name: "JSESSIONID".into(),
                value: "abc".into(),
                domain: "ehall.szu.edu.cn".into(),
                path: "/".into(),
                expires: -1.0,
                http_only: true,
                secure: false,
            }],
            storage: HashMap::from([("token".to_string(), "xyz".to_string())]),
        }
    }

    #[test]
    fn test_fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        assert!(store.load().unwrap().is_none());

        store.save(&sample_artifacts()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.cookies.len(), 1);
        assert_eq!(loaded.cookies[0].name, "JSESSIONID");
        assert_eq!(loaded.storage.get("token"), Some(&"xyz".to_string()));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_fs_store_tolerates_corrupt_cookie_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cookies.json"), "not json").unwrap();

        let store = FsSessionStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_fs_store_missing_storage_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        store.save(&sample_artifacts()).unwrap();
        std::fs::remove_file(dir.path().join("storage.json")).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.storage.is_empty());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&sample_artifacts()).unwrap();
        assert!(store.load().unwrap().is_some());

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
