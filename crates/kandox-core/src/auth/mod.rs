//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `CredentialStore`: the single bearer-token slot (memory, file or keyring)
//! - `RefreshCoordinator`: at most one credential refresh in flight
//! - `SessionSignal`: the read-only session state the shell subscribes to
//! - `AuthService`: bootstrap, login and logout
//!
//! Login and refresh are the only endpoints called without a credential.

pub mod credentials;
pub mod endpoint;
pub mod refresh;
pub mod service;
pub mod signal;
pub mod token_file;

pub use credentials::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore, TOKEN_KEY};
pub use endpoint::is_auth_endpoint;
pub use refresh::RefreshCoordinator;
pub use service::AuthService;
pub use signal::{SessionObserver, SessionSignal, SessionState, SessionStatus};
pub use token_file::FileCredentialStore;
