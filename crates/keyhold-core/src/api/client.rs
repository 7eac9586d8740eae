//! API client for the authentication server.
//!
//! `AuthClient` exchanges credentials for a token (`login`, `register`) and
//! performs authenticated calls with an explicit `RequestContext`.

use reqwest::{header, Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};

use super::{AuthError, RequestContext};

// ============================================================================
// Constants
// ============================================================================

/// Fallback server address when neither the environment nor the config name one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";

/// Path segment under which account records live (`/auth/{id}`)
const USER_SEGMENT: &str = "auth";

/// API client for the authentication server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a new client for the given base URL.
    ///
    /// Cookies set by the server are kept and replayed, so credentialed
    /// requests behave like a browser with `withCredentials`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        match Url::parse(&base_url) {
            Ok(url) if !url.cannot_be_a_base() => {}
            Ok(_) => return Err(AuthError::InvalidBaseUrl(base_url)),
            Err(e) => return Err(AuthError::InvalidBaseUrl(format!("{}: {}", base_url, e))),
        }
        let client = Client::builder().cookie_store(true).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/auth/{id}` with the id escaped as a single path segment
    fn user_url(&self, user_id: &str) -> Result<Url, AuthError> {
        let invalid = || AuthError::InvalidBaseUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(USER_SEGMENT)
            .push(user_id);
        Ok(url)
    }

    /// Exchange email and password for a session token
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        debug!(
            email = %request.email,
            password_len = request.password.len(),
            "Sending login request"
        );
        self.post_credentials(LOGIN_PATH, request).await
    }

    /// Create an account and receive a session token for it
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        debug!(
            email = %request.email,
            name = %request.name,
            "Sending register request"
        );
        self.post_credentials(REGISTER_PATH, request).await
    }

    /// Fetch an account record. Requires an authenticated context.
    pub async fn fetch_user(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<UserProfile, AuthError> {
        let url = self.user_url(user_id)?;
        let request = ctx.apply(
            self.client
                .get(url)
                .header(header::ACCEPT, "application/json"),
        );

        let response = Self::check_response(request.send().await?).await?;
        Self::parse_json(response).await
    }

    async fn post_credentials<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, AuthError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        debug!(status = %response.status(), url = %url, "Auth response received");
        let response = Self::check_response(response).await?;

        // A 2xx with an unreadable body is reported as "no token" by the caller
        let text = response.text().await?;
        match serde_json::from_str::<AuthResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!(error = %e, body_len = text.len(), "Unparseable auth response body");
                Ok(AuthResponse::default())
            }
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AuthClient::new("http://example.test:8080/").expect("client");
        assert_eq!(client.base_url(), "http://example.test:8080");
        assert_eq!(client.url(LOGIN_PATH), "http://example.test:8080/auth/login");
    }

    #[test]
    fn test_user_url_escapes_id() {
        let client = AuthClient::new("http://example.test/api/").expect("client");
        assert_eq!(
            client.user_url("42").expect("url").as_str(),
            "http://example.test/api/auth/42"
        );

        let url = client.user_url("../a/b?c#d").expect("url");
        assert_eq!(url.path(), "/api/auth/..%2Fa%2Fb%3Fc%23d");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            AuthClient::new("localhost:8080"),
            Err(AuthError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            AuthClient::new("not a url"),
            Err(AuthError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_default_base_url() {
        let client = AuthClient::new(DEFAULT_API_BASE_URL).expect("client");
        assert_eq!(client.url(REGISTER_PATH), "http://localhost:8080/auth/register");
    }
}
