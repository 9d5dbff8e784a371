//! The explicit context shared by the client and the shell.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::info;

use crate::auth::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    RefreshCoordinator, SessionObserver, SessionSignal,
};
use crate::config::{Config, CredentialBackend};
use crate::notify::{Notifier, TracingNotifier};

/// Which screen the shell is currently showing.
///
/// Only the route prefix matters to the pipeline: a failed refresh while on
/// a protected route terminates the session.
#[derive(Debug)]
pub struct ViewContext {
    route: RwLock<String>,
    protected_prefix: String,
    login_route: String,
}

impl ViewContext {
    pub fn new(protected_prefix: impl Into<String>, login_route: impl Into<String>) -> Self {
        Self {
            route: RwLock::new("/".to_string()),
            protected_prefix: protected_prefix.into(),
            login_route: login_route.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.protected_prefix.clone(), config.login_route.clone())
    }

    pub fn set_route(&self, route: impl Into<String>) {
        *self.route.write() = route.into();
    }

    pub fn route(&self) -> String {
        self.route.read().clone()
    }

    pub fn is_protected(&self) -> bool {
        self.route.read().starts_with(&self.protected_prefix)
    }

    pub fn is_login_route(&self) -> bool {
        *self.route.read() == self.login_route
    }
}

impl Default for ViewContext {
    fn default() -> Self {
        Self::new("/admin", "/login")
    }
}

pub struct AuthContext {
    credentials: Arc<dyn CredentialStore>,
    session: Arc<SessionSignal>,
    observer: Arc<dyn SessionObserver>,
    refresh: RefreshCoordinator,
    view: Arc<ViewContext>,
    notifier: Arc<dyn Notifier>,
}

impl AuthContext {
    pub fn new(credentials: Arc<dyn CredentialStore>, view: Arc<ViewContext>) -> Self {
        let session = Arc::new(SessionSignal::new());
        Self {
            credentials,
            observer: session.clone(),
            session,
            refresh: RefreshCoordinator::new(),
            view,
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// Build the context described by `config`, opening the configured
    /// credential backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials: Arc<dyn CredentialStore> = match config.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(&config.cache_dir()?)),
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()?),
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        };
        info!(backend = %config.credential_backend, "Credential store opened");
        Ok(Self::new(credentials, Arc::new(ViewContext::from_config(config))))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the invalidation observer (the session signal by default).
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn session(&self) -> &Arc<SessionSignal> {
        &self.session
    }

    pub fn observer(&self) -> &Arc<dyn SessionObserver> {
        &self.observer
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn view(&self) -> &Arc<ViewContext> {
        &self.view
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_prefix() {
        let view = ViewContext::default();
        assert!(!view.is_protected());
        view.set_route("/admin/users");
        assert!(view.is_protected());
        assert_eq!(view.route(), "/admin/users");
        view.set_route("/login");
        assert!(!view.is_protected());
        assert!(view.is_login_route());
    }

    #[test]
    fn test_memory_backend_from_config() {
        let config = Config {
            credential_backend: CredentialBackend::Memory,
            protected_prefix: "/console".to_string(),
            ..Config::default()
        };
        let context = AuthContext::from_config(&config).expect("context");
        assert!(!context.credentials().has_token());
        context.view().set_route("/console/roles");
        assert!(context.view().is_protected());
    }

    #[test]
    fn test_default_observer_is_session() {
        let context = AuthContext::new(Arc::new(MemoryCredentialStore::new()), Arc::new(ViewContext::default()));
        context.observer().session_invalidated("expired");
        assert_eq!(context.session().snapshot().invalid_reason.as_deref(), Some("expired"));
    }
}
