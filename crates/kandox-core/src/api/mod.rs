//! REST API client module for the Kandox backend.
//!
//! This module provides the `ApiClient` request pipeline together with the
//! response `Envelope` every endpoint returns and the `ApiRequest` builder.
//!
//! Protected endpoints take a bearer token; an expired token is refreshed
//! once through the shared refresh coordinator and the request retried.

pub mod client;
pub mod envelope;
pub mod error;
pub mod request;

pub use client::{ApiClient, Download, Reply};
pub use envelope::{Envelope, MessageText};
pub use error::ApiError;
pub use request::{ApiRequest, RequestBody, ResponseKind, NO_RETRY_HEADER};
pub use reqwest::Method;
