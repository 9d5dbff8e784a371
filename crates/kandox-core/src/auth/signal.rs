//! Process-wide session state broadcast to the shell.
//!
//! The shell only ever reads (via `subscribe` or `snapshot`). Writers are
//! crate-private and limited to bootstrap, login and logout in
//! [`AuthService`](super::AuthService); the request pipeline reaches the
//! fourth writer, invalidation, only through the [`SessionObserver`] trait.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::Account;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    pub loading: bool,
    /// Set when the session was terminated by a failed refresh. Cleared by
    /// the next successful login.
    pub invalid_reason: Option<String>,
    pub account: Option<Account>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            authenticated: false,
            loading: true,
            invalid_reason: None,
            account: None,
        }
    }
}

/// Coarse session phase derived from [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Bootstrapping,
    Authenticated,
    Invalid,
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        if self.authenticated {
            SessionStatus::Authenticated
        } else if self.loading {
            SessionStatus::Bootstrapping
        } else {
            SessionStatus::Invalid
        }
    }
}

/// Receives irrecoverable session failures from the request pipeline.
pub trait SessionObserver: Send + Sync {
    fn session_invalidated(&self, reason: &str);
}

pub struct SessionSignal {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub(crate) fn begin_bootstrap(&self) {
        self.tx.send_modify(|state| {
            state.loading = true;
        });
    }

    pub(crate) fn finish_bootstrap(&self, account: Option<Account>) {
        self.tx.send_modify(|state| {
            state.loading = false;
            state.authenticated = account.is_some();
            state.account = account;
        });
        info!(authenticated = self.tx.borrow().authenticated, "Session bootstrap finished");
    }

    pub(crate) fn signed_in(&self, account: Account) {
        info!(user = %account.email, "Signed in");
        self.tx.send_modify(|state| {
            state.authenticated = true;
            state.loading = false;
            state.invalid_reason = None;
            state.account = Some(account);
        });
    }

    pub(crate) fn signed_out(&self) {
        self.tx.send_modify(|state| {
            state.authenticated = false;
            state.loading = false;
            state.account = None;
        });
        info!("Signed out");
    }
}

impl SessionObserver for SessionSignal {
    /// Flip to invalid. Repeated invalidations keep the first reason and do
    /// not wake subscribers again.
    fn session_invalidated(&self, reason: &str) {
        let changed = self.tx.send_if_modified(|state| {
            if state.invalid_reason.is_some() {
                return false;
            }
            state.authenticated = false;
            state.loading = false;
            state.account = None;
            state.invalid_reason = Some(reason.to_string());
            true
        });
        if changed {
            warn!(reason = %reason, "Session invalidated");
        }
    }
}
