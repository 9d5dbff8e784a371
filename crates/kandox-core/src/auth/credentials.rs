use anyhow::{Context, Result};
use keyring::Entry;
use parking_lot::RwLock;

const SERVICE_NAME: &str = "kandox-console";

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "access_token";

/// The single slot holding the current bearer token.
///
/// Implementations keep an in-memory copy that is updated before the durable
/// write, so `token()` always returns the most recently committed value even
/// when persistence fails.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;

    fn store(&self, token: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    fn has_token(&self) -> bool {
        self.token().is_some()
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.token.write() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.write() = None;
        Ok(())
    }
}

/// Token persisted in the OS keychain.
pub struct KeyringCredentialStore {
    entry: Entry,
    cached: RwLock<Option<String>>,
}

impl KeyringCredentialStore {
    pub fn new() -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_KEY).context("Failed to create keyring entry")?;
        let cached = match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read token from keychain");
                None
            }
        };
        Ok(Self {
            entry,
            cached: RwLock::new(cached),
        })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn token(&self) -> Option<String> {
        self.cached.read().clone()
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.cached.write() = Some(token.to_string());
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        *self.cached.write() = None;
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(!store.has_token());

        store.store("token1").expect("store");
        assert_eq!(store.token().as_deref(), Some("token1"));

        store.store("token2").expect("overwrite");
        assert_eq!(store.token().as_deref(), Some("token2"));

        store.clear().expect("clear");
        assert!(store.token().is_none());
    }

    #[test]
    fn test_memory_store_with_token() {
        let store = MemoryCredentialStore::with_token("seed");
        assert!(store.has_token());
    }
}
