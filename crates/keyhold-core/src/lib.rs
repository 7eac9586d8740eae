//! Core library for keyhold.
//!
//! - `auth`: session state holder, persistent stores, login/register flows
//! - `api`: HTTP client for the remote authentication server
//! - `models`: wire types exchanged with that server
//! - `config`: configuration and directory resolution

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{AuthClient, AuthError, RequestContext};
pub use auth::{
    AccessLevel, AuthChange, AuthEvent, Destination, FileStore, KeyValueStore, KeyringStore,
    LoginForm, MemoryStore, RegisterForm, Session, SessionHolder, StoreWatcher, SubmissionState,
};
pub use config::{Config, StoreBackend};
