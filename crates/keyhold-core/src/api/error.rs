use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Server rejected request (status {status})")]
    ServerRejected {
        status: u16,
        /// Body text, when the server answered with plain text rather than JSON
        message: Option<String>,
    },

    #[error("Invalid response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    NetworkUnavailable(#[from] reqwest::Error),

    #[error("Could not persist session: {0}")]
    LocalStorage(String),

    #[error("Invalid server address: {0}")]
    InvalidBaseUrl(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid keeping excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Plain-text bodies are shown to the user; JSON error documents and
    /// empty bodies are not.
    fn textual_body(body: &str) -> Option<String> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(serde_json::Value::String(s)) if !s.is_empty() => Some(Self::truncate_body(&s)),
            Ok(_) => None,
            Err(_) => Some(Self::truncate_body(trimmed)),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => AuthError::InvalidCredentials,
            code => AuthError::ServerRejected {
                status: code,
                message: Self::textual_body(body),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_401_is_invalid_credentials() {
        let err = AuthError::from_status(StatusCode::UNAUTHORIZED, "Invalid credentials");
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_text_body_is_kept() {
        let err = AuthError::from_status(StatusCode::BAD_REQUEST, "Email already exists");
        match err {
            AuthError::ServerRejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message.as_deref(), Some("Email already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_json_body_is_not_textual() {
        let body = r#"{"timestamp":"2024-01-01","status":500,"error":"Internal Server Error"}"#;
        let err = AuthError::from_status(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(matches!(
            err,
            AuthError::ServerRejected { status: 500, message: None }
        ));
    }

    #[test]
    fn test_json_string_body_is_textual() {
        assert_eq!(
            AuthError::textual_body(r#""Admin already exists""#).as_deref(),
            Some("Admin already exists")
        );
        assert_eq!(AuthError::textual_body("   "), None);
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(600);
        let truncated = AuthError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
    }
}
