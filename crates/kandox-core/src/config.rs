//! Application configuration management.
//!
//! Configuration is stored at `~/.config/kandox-console/config.json` and
//! may be overridden per process through `KANDOX_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "kandox-console";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Where the bearer token is kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

impl fmt::Display for CredentialBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Keyring => "keyring",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    /// Route prefix under which a failed refresh terminates the session.
    pub protected_prefix: String,
    pub login_route: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            protected_prefix: "/admin".to_string(),
            login_route: "/login".to_string(),
            request_timeout_secs: 30,
            refresh_timeout_secs: 15,
            credential_backend: CredentialBackend::default(),
            last_username: None,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `KANDOX_*` overrides read through `lookup`. Invalid values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("KANDOX_BASE_URL") {
            self.base_url = url;
        }
        if let Some(prefix) = lookup("KANDOX_PROTECTED_PREFIX") {
            self.protected_prefix = prefix;
        }
        if let Some(backend) = lookup("KANDOX_CREDENTIAL_BACKEND") {
            match backend.parse() {
                Ok(backend) => self.credential_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring KANDOX_CREDENTIAL_BACKEND"),
            }
        }
        if let Some(username) = lookup("KANDOX_USERNAME") {
            self.last_username = Some(username);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).expect("load");
        assert_eq!(config.protected_prefix, "/admin");
        assert_eq!(config.login_route, "/login");
        assert_eq!(config.credential_backend, CredentialBackend::File);
        assert_eq!(config.refresh_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            base_url: "https://kandox.example.vn".to_string(),
            credential_backend: CredentialBackend::Keyring,
            last_username: Some("admin".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.base_url, "https://kandox.example.vn");
        assert_eq!(loaded.credential_backend, CredentialBackend::Keyring);
        assert_eq!(loaded.last_username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"base_url":"http://10.0.0.5:3000","credential_backend":"memory"}"#)
            .expect("write");
        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.base_url, "http://10.0.0.5:3000");
        assert_eq!(config.credential_backend, CredentialBackend::Memory);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("KANDOX_BASE_URL", "http://api.local"),
            ("KANDOX_CREDENTIAL_BACKEND", "Keyring"),
            ("KANDOX_USERNAME", "ops"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.base_url, "http://api.local");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.last_username.as_deref(), Some("ops"));
        assert_eq!(config.protected_prefix, "/admin");
    }

    #[test]
    fn test_invalid_backend_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "KANDOX_CREDENTIAL_BACKEND").then(|| "vault".to_string()));
        assert_eq!(config.credential_backend, CredentialBackend::File);
    }
}
