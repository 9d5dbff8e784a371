use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::credentials::CredentialStore;

/// Token file name in cache directory
const TOKEN_FILE: &str = "access_token.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    access_token: String,
    saved_at: DateTime<Utc>,
}

/// Token persisted as JSON in the cache directory.
///
/// Reads are served from memory; every write goes to memory first and then
/// to disk.
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileCredentialStore {
    /// Open the store in `cache_dir`, loading any token saved by a previous run.
    pub fn new(cache_dir: &Path) -> Self {
        let path = cache_dir.join(TOKEN_FILE);
        let cached = match Self::load(&path) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable token file");
                None
            }
        };
        debug!(has_token = cached.is_some(), "Token file loaded");
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }

    fn load(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read token file")?;
        let file: TokenFile = serde_json::from_str(&contents).context("Failed to parse token file")?;
        Ok(Some(file.access_token))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        self.cached.read().clone()
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.cached.write() = Some(token.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let file = TokenFile {
            access_token: token.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, contents).context("Failed to write token file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.cached.write() = None;
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");

        let store = FileCredentialStore::new(dir.path());
        assert!(store.token().is_none());
        store.store("token1").expect("store");

        let reopened = FileCredentialStore::new(dir.path());
        assert_eq!(reopened.token().as_deref(), Some("token1"));
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path());
        store.store("token1").expect("store");
        assert!(store.path().exists());

        store.clear().expect("clear");
        assert!(store.token().is_none());
        assert!(!store.path().exists());

        // Clearing twice is fine
        store.clear().expect("clear again");
    }

    #[test]
    fn test_creates_missing_cache_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("kandox-console");
        let store = FileCredentialStore::new(&nested);
        store.store("token1").expect("store");
        assert!(nested.join(TOKEN_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(TOKEN_FILE), "not json").expect("write");
        let store = FileCredentialStore::new(dir.path());
        assert!(store.token().is_none());
    }
}
