//! Login and registration form flows.
//!
//! A form holds a draft, a submission state and the last error message.
//! `begin` hands out the request body and locks the form until `complete`
//! is called with the server's answer, so a form never has two requests
//! in flight. Front ends that await inline can use `submit` instead.

use tracing::{error, info, warn};

use crate::api::{AuthClient, AuthError};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};

use super::holder::SessionHolder;

// ============================================================================
// User-facing messages
// ============================================================================

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_RESPONSE: &str = "Invalid response from server";
const NO_TOKEN_RECEIVED: &str = "No token received from server";
const LOGIN_FAILED: &str = "Login failed. Please try again.";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const LOGIN_OFFLINE: &str = "Unable to connect to server. Please check your network connection.";
const REGISTER_OFFLINE: &str = "Registration failed. Check network or server.";
const SAVE_FAILED: &str = "Could not save your session. Please try again.";

/// Which endpoint a form talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Login,
    Register,
}

impl FlowKind {
    pub fn label(&self) -> &'static str {
        match self {
            FlowKind::Login => "login",
            FlowKind::Register => "register",
        }
    }

    /// Map a failed submission to the text shown under the form
    pub fn user_message(&self, err: &AuthError) -> String {
        match err {
            AuthError::InvalidCredentials => INVALID_CREDENTIALS.to_string(),
            AuthError::ServerRejected {
                message: Some(text),
                ..
            } => text.clone(),
            AuthError::ServerRejected { message: None, .. } | AuthError::InvalidBaseUrl(_) => {
                match self {
                    FlowKind::Login => LOGIN_FAILED.to_string(),
                    FlowKind::Register => REGISTER_FAILED.to_string(),
                }
            }
            AuthError::MalformedResponse(_) => INVALID_RESPONSE.to_string(),
            AuthError::NetworkUnavailable(_) => match self {
                FlowKind::Login => LOGIN_OFFLINE.to_string(),
                FlowKind::Register => REGISTER_OFFLINE.to_string(),
            },
            AuthError::LocalStorage(_) => SAVE_FAILED.to_string(),
        }
    }

    fn missing_token_message(&self) -> &'static str {
        match self {
            FlowKind::Login => INVALID_RESPONSE,
            FlowKind::Register => NO_TOKEN_RECEIVED,
        }
    }

    /// Where to go when the server answered 2xx without a token
    fn missing_token_destination(&self) -> Option<Destination> {
        match self {
            FlowKind::Login => None,
            FlowKind::Register => Some(Destination::Login),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
}

/// Screen to show after a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Home,
    Login,
}

/// Why `begin` refused to start a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginError {
    /// A request from this form is already in flight
    Busy,
    /// A required field is empty
    MissingField(&'static str),
}

/// Field access the generic form needs from a draft
pub trait Draft: Clone {
    const KIND: FlowKind;

    /// Name of the first empty required field
    fn missing_field(&self) -> Option<&'static str>;

    /// Drop secrets once they are no longer needed
    fn clear_secret(&mut self);
}

impl Draft for LoginRequest {
    const KIND: FlowKind = FlowKind::Login;

    fn missing_field(&self) -> Option<&'static str> {
        if self.email.is_empty() {
            Some("email")
        } else if self.password.is_empty() {
            Some("password")
        } else {
            None
        }
    }

    fn clear_secret(&mut self) {
        self.password.clear();
    }
}

impl Draft for RegisterRequest {
    const KIND: FlowKind = FlowKind::Register;

    fn missing_field(&self) -> Option<&'static str> {
        if self.name.is_empty() {
            Some("name")
        } else if self.email.is_empty() {
            Some("email")
        } else if self.password.is_empty() {
            Some("password")
        } else {
            None
        }
    }

    fn clear_secret(&mut self) {
        self.password.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionForm<D> {
    pub draft: D,
    state: SubmissionState,
    error: Option<String>,
}

pub type LoginForm = SubmissionForm<LoginRequest>;
pub type RegisterForm = SubmissionForm<RegisterRequest>;

impl<D: Draft> SubmissionForm<D> {
    pub fn new(draft: D) -> Self {
        Self {
            draft,
            state: SubmissionState::Idle,
            error: None,
        }
    }

    pub fn kind(&self) -> FlowKind {
        D::KIND
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state() == SubmissionState::Submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Start a submission: clears the previous error and returns the body
    /// to send. Refused while another submission is in flight.
    pub fn begin(&mut self) -> Result<D, BeginError> {
        if self.is_submitting() {
            return Err(BeginError::Busy);
        }
        if let Some(field) = self.draft.missing_field() {
            self.error = Some(format!("Please fill in the {} field", field));
            return Err(BeginError::MissingField(field));
        }
        self.error = None;
        self.state = SubmissionState::Submitting;
        Ok(self.draft.clone())
    }

    /// Finish a submission with the server's answer.
    ///
    /// On success the session is handed to `holder`. The form is always
    /// back to `Idle` afterwards. Returns the screen to navigate to, if any.
    pub fn complete(
        &mut self,
        result: Result<AuthResponse, AuthError>,
        holder: &mut SessionHolder,
    ) -> Option<Destination> {
        self.state = SubmissionState::Idle;
        let kind = D::KIND;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.fail(&e);
                return None;
            }
        };

        if response.token().is_none() {
            warn!(flow = kind.label(), "Server response carried no token");
            self.error = Some(kind.missing_token_message().to_string());
            return kind.missing_token_destination();
        }

        let Some(session) = response.into_session() else {
            self.fail(&AuthError::MalformedResponse("missing userId".to_string()));
            return None;
        };

        if let Err(e) = holder.login(session) {
            self.fail(&AuthError::LocalStorage(format!("{:#}", e)));
            return None;
        }

        self.draft.clear_secret();
        info!(flow = kind.label(), "Submission succeeded");
        Some(Destination::Home)
    }

    fn fail(&mut self, err: &AuthError) {
        error!(flow = D::KIND.label(), error = %err, "Submission failed");
        self.error = Some(D::KIND.user_message(err));
    }
}

impl LoginForm {
    pub fn login() -> Self {
        Self::new(LoginRequest::default())
    }

    /// Begin, send and complete in one call
    pub async fn submit(
        &mut self,
        client: &AuthClient,
        holder: &mut SessionHolder,
    ) -> Option<Destination> {
        let request = self.begin().ok()?;
        let result = client.login(&request).await;
        self.complete(result, holder)
    }
}

impl RegisterForm {
    pub fn register() -> Self {
        Self::new(RegisterRequest::default())
    }

    /// Begin, send and complete in one call
    pub async fn submit(
        &mut self,
        client: &AuthClient,
        holder: &mut SessionHolder,
    ) -> Option<Destination> {
        let request = self.begin().ok()?;
        let result = client.register(&request).await;
        self.complete(result, holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessLevel, MemoryStore};

    fn holder() -> SessionHolder {
        SessionHolder::open(Box::new(MemoryStore::new()))
    }

    fn filled_login() -> LoginForm {
        LoginForm::new(LoginRequest {
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
        })
    }

    fn filled_register() -> RegisterForm {
        RegisterForm::new(RegisterRequest {
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
        })
    }

    fn response(json: &str) -> AuthResponse {
        serde_json::from_str(json).expect("parse response")
    }

    #[test]
    fn test_begin_gates_resubmission() {
        let mut form = filled_login();
        assert_eq!(form.state(), SubmissionState::Idle);
        assert!(form.begin().is_ok());
        assert!(form.is_submitting());
        assert_eq!(form.begin().unwrap_err(), BeginError::Busy);
    }

    #[test]
    fn test_begin_requires_fields() {
        let mut form = RegisterForm::register();
        form.draft.email = "a@b.com".to_string();
        assert_eq!(form.begin().unwrap_err(), BeginError::MissingField("name"));
        assert_eq!(form.error(), Some("Please fill in the name field"));
        assert!(!form.is_submitting());
    }

    #[test]
    fn test_begin_clears_previous_error() {
        let mut form = filled_login();
        let mut h = holder();
        form.begin().unwrap();
        form.complete(Err(AuthError::InvalidCredentials), &mut h);
        assert!(form.error().is_some());
        form.begin().unwrap();
        assert!(form.error().is_none());
    }

    #[test]
    fn test_login_success_goes_home() {
        let mut form = filled_login();
        let mut h = holder();
        form.begin().unwrap();
        let dest = form.complete(
            Ok(response(
                r#"{"token":"t1","userId":"42","name":"A","email":"a@b.com","access":"admin"}"#,
            )),
            &mut h,
        );

        assert_eq!(dest, Some(Destination::Home));
        assert_eq!(form.state(), SubmissionState::Idle);
        assert!(form.error().is_none());
        assert!(form.draft.password.is_empty());
        assert!(h.is_authenticated());
        assert_eq!(h.session().unwrap().access_level, AccessLevel::Admin);
    }

    #[test]
    fn test_register_success_defaults_access() {
        let mut form = filled_register();
        let mut h = holder();
        form.begin().unwrap();
        let dest = form.complete(Ok(response(r#"{"token":"t1","userId":"42"}"#)), &mut h);
        assert_eq!(dest, Some(Destination::Home));
        assert_eq!(h.session().unwrap().access_level, AccessLevel::User);
    }

    #[test]
    fn test_login_401_message() {
        let mut form = filled_login();
        let mut h = holder();
        form.begin().unwrap();
        let dest = form.complete(Err(AuthError::InvalidCredentials), &mut h);
        assert_eq!(dest, None);
        assert_eq!(form.error(), Some("Invalid email or password"));
        assert!(!h.is_authenticated());
        assert_eq!(h.revision(), 0);
    }

    #[test]
    fn test_login_without_token_stays() {
        let mut form = filled_login();
        let mut h = holder();
        form.begin().unwrap();
        let dest = form.complete(Ok(response(r#"{"userId":"42"}"#)), &mut h);
        assert_eq!(dest, None);
        assert_eq!(form.error(), Some("Invalid response from server"));
        assert!(!h.is_authenticated());
    }

    #[test]
    fn test_register_without_token_goes_to_login() {
        let mut form = filled_register();
        let mut h = holder();
        form.begin().unwrap();
        let dest = form.complete(Ok(response(r#"{"name":"A"}"#)), &mut h);
        assert_eq!(dest, Some(Destination::Login));
        assert_eq!(form.error(), Some("No token received from server"));
        assert!(!h.is_authenticated());
    }

    #[test]
    fn test_token_without_user_id_is_rejected() {
        let mut form = filled_register();
        let mut h = holder();
        form.begin().unwrap();
        let dest = form.complete(Ok(response(r#"{"token":"t1"}"#)), &mut h);
        assert_eq!(dest, None);
        assert_eq!(form.error(), Some("Invalid response from server"));
        assert!(!h.is_authenticated());
    }

    #[test]
    fn test_user_messages() {
        let rejected_text = AuthError::ServerRejected {
            status: 400,
            message: Some("Email already exists".to_string()),
        };
        let rejected_json = AuthError::ServerRejected {
            status: 500,
            message: None,
        };

        assert_eq!(FlowKind::Register.user_message(&rejected_text), "Email already exists");
        assert_eq!(
            FlowKind::Login.user_message(&rejected_json),
            "Login failed. Please try again."
        );
        assert_eq!(
            FlowKind::Register.user_message(&rejected_json),
            "Registration failed. Please try again."
        );
        assert_eq!(
            FlowKind::Register.user_message(&AuthError::InvalidCredentials),
            "Invalid email or password"
        );
        assert_eq!(
            FlowKind::Login.user_message(&AuthError::LocalStorage("disk full".to_string())),
            "Could not save your session. Please try again."
        );
    }
}
