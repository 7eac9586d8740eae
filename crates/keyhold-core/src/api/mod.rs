//! REST API client module for the authentication server.
//!
//! This module provides the `AuthClient` for exchanging credentials for a
//! bearer token, and the `RequestContext` that carries that token into
//! authenticated calls.
//!
//! There is no global Authorization header: every authenticated call takes
//! the context explicitly, built from the current session at call time.

pub mod client;
pub mod context;
pub mod error;

pub use client::{AuthClient, DEFAULT_API_BASE_URL};
pub use context::RequestContext;
pub use error::AuthError;
