//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`: the authenticated identity and bearer token
//! - `SessionHolder`: in-memory owner of the session, mirrored to a store
//! - `KeyValueStore` backends: `FileStore`, `KeyringStore`, `MemoryStore`
//! - `LoginForm` / `RegisterForm`: credential submission flows
//!
//! Sessions carry no expiry. They last until logout, here or in another
//! process sharing the same store.

pub mod credentials;
pub mod flow;
pub mod holder;
pub mod session;
pub mod store;

pub use credentials::KeyringStore;
pub use flow::{
    BeginError, Destination, Draft, FlowKind, LoginForm, RegisterForm, SubmissionForm,
    SubmissionState,
};
pub use holder::{AuthChange, AuthEvent, Listener, SessionHolder, SubscriptionId};
pub use session::{AccessLevel, Session};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreChange, StoreWatcher};
