//! Wire types for the authentication server.
//!
//! - `LoginRequest`, `RegisterRequest`: form drafts sent as JSON bodies
//! - `AuthResponse`: success body of `/auth/login` and `/auth/register`
//! - `UserProfile`: body of `GET /auth/{id}`

pub mod user;

pub use user::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
