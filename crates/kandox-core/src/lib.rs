//! Core library for the Kandox console.
//!
//! Everything a front end needs to talk to the contest/scoring backend:
//!
//! - `api`: the `ApiClient` request pipeline (credential attachment, 401
//!   recovery, envelope normalization)
//! - `auth`: credential storage, the single-flight refresh coordinator,
//!   the session signal and the login/logout/bootstrap operations
//! - `context`: the `AuthContext` shared by the client and the shell
//! - `config`: on-disk configuration with environment overrides
//! - `models`: account, permission and pagination payloads
//! - `notify`: the side channel for user-facing advisories

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod models;
pub mod notify;
pub mod utils;

pub use api::{ApiClient, ApiError, ApiRequest, Envelope, Reply};
pub use auth::{AuthService, SessionSignal, SessionState, SessionStatus};
pub use config::Config;
pub use context::{AuthContext, ViewContext};
