//! Application state management for keyhold.
//!
//! This module contains the core `App` struct that owns the session holder,
//! the two credential forms, the current route, and the channel that brings
//! background request results and auth broadcasts back to the UI loop.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use keyhold_core::auth::{BeginError, Draft, SubmissionForm};
use keyhold_core::models::{AuthResponse, UserProfile};
use keyhold_core::{
    AuthClient, AuthError, AuthEvent, Config, Destination, LoginForm, RegisterForm,
    SessionHolder, StoreBackend, StoreWatcher,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background message channel.
/// Holds a handful of request results plus auth broadcasts between ticks.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for name and email input.
const MAX_FIELD_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Routing and focus
// ============================================================================

/// Which screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Email,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

/// Register form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFocus {
    Name,
    Email,
    Password,
    Button,
}

impl RegisterFocus {
    pub fn next(self) -> Self {
        match self {
            RegisterFocus::Name => RegisterFocus::Email,
            RegisterFocus::Email => RegisterFocus::Password,
            RegisterFocus::Password => RegisterFocus::Button,
            RegisterFocus::Button => RegisterFocus::Name,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            RegisterFocus::Name => RegisterFocus::Button,
            RegisterFocus::Email => RegisterFocus::Name,
            RegisterFocus::Password => RegisterFocus::Email,
            RegisterFocus::Button => RegisterFocus::Password,
        }
    }
}

// ============================================================================
// Background messages
// ============================================================================

/// Messages delivered to the UI loop through the MPSC channel.
enum AppMessage {
    /// A login request finished
    LoginDone(Result<AuthResponse, AuthError>),
    /// A register request finished
    RegisterDone(Result<AuthResponse, AuthError>),
    /// Account record fetched for the home screen
    ProfileLoaded(Result<UserProfile, AuthError>),
    /// The session holder broadcast a change
    Auth(AuthEvent),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub holder: SessionHolder,
    pub client: AuthClient,
    watcher: Option<StoreWatcher>,

    // UI State
    pub route: Route,
    pub state: AppState,
    pub login: LoginForm,
    pub login_focus: LoginFocus,
    pub register: RegisterForm,
    pub register_focus: RegisterFocus,
    pub status_message: Option<String>,
    pub profile: Option<UserProfile>,
    pub profile_loading: bool,
    pub last_event: Option<AuthEvent>,

    tx: mpsc::Sender<AppMessage>,
    rx: mpsc::Receiver<AppMessage>,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let base_url = config.api_base_url();
        debug!(%base_url, backend = ?config.store_backend, "Config loaded");
        let client = AuthClient::new(base_url)?;

        let holder = SessionHolder::open(config.open_store()?);
        let watcher = match config.store_backend {
            StoreBackend::File => Some(StoreWatcher::new(&config.file_store()?)),
            StoreBackend::Keyring => None,
        };

        Ok(Self::with_parts(config, holder, client, watcher))
    }

    /// Assemble an app from already opened services
    pub fn with_parts(
        config: Config,
        holder: SessionHolder,
        client: AuthClient,
        watcher: Option<StoreWatcher>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut login = LoginForm::login();
        login.draft.email = config.last_email.clone().unwrap_or_default();
        let login_focus = if login.draft.email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };

        let route = if holder.is_authenticated() {
            Route::Home
        } else {
            Route::Login
        };

        let mut app = Self {
            config,
            holder,
            client,
            watcher,
            route,
            state: AppState::Normal,
            login,
            login_focus,
            register: RegisterForm::register(),
            register_focus: RegisterFocus::Name,
            status_message: None,
            profile: None,
            profile_loading: false,
            last_event: None,
            tx,
            rx,
        };
        app.subscribe_to_auth();
        app
    }

    /// Forward every holder broadcast into the UI loop
    fn subscribe_to_auth(&mut self) {
        let tx = self.tx.clone();
        self.holder.subscribe(Box::new(move |ev: &AuthEvent| {
            if let Err(e) = tx.try_send(AppMessage::Auth(ev.clone())) {
                warn!(error = %e, "Dropped auth event");
            }
        }));
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Send the login form, unless a submission is already in flight
    pub fn submit_login(&mut self) {
        let Some(request) = Self::begin_or_report(&mut self.login) else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.login(&request).await;
            let _ = tx.send(AppMessage::LoginDone(result)).await;
        });
    }

    /// Send the register form, unless a submission is already in flight
    pub fn submit_register(&mut self) {
        let Some(request) = Self::begin_or_report(&mut self.register) else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.register(&request).await;
            let _ = tx.send(AppMessage::RegisterDone(result)).await;
        });
    }

    fn begin_or_report<D: Draft>(form: &mut SubmissionForm<D>) -> Option<D> {
        match form.begin() {
            Ok(request) => {
                info!(flow = form.kind().label(), "Submitting");
                Some(request)
            }
            Err(BeginError::Busy) => {
                debug!(flow = form.kind().label(), "Submission already in flight");
                None
            }
            Err(BeginError::MissingField(field)) => {
                debug!(flow = form.kind().label(), field, "Required field empty");
                None
            }
        }
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.holder.logout() {
            warn!(error = %e, "Logout could not clear the store");
            self.status_message =
                Some("Logged out, but the saved session could not be removed".to_string());
        }
        self.profile = None;
    }

    pub fn request_refresh(&mut self) {
        self.holder.request_refresh();
    }

    /// Fetch the account record with the current session's credentials
    pub fn fetch_profile(&mut self) {
        let Some(user_id) = self.holder.session().map(|s| s.user_id.clone()) else {
            return;
        };
        if self.profile_loading {
            return;
        }
        self.profile_loading = true;
        let ctx = self.holder.request_context();
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_user(&ctx, &user_id).await;
            let _ = tx.send(AppMessage::ProfileLoaded(result)).await;
        });
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn show_login(&mut self) {
        self.route = Route::Login;
        self.login_focus = if self.login.draft.email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
    }

    pub fn show_register(&mut self) {
        self.route = Route::Register;
        self.register_focus = RegisterFocus::Name;
    }

    fn navigate(&mut self, destination: Destination) {
        match destination {
            Destination::Home => {
                self.route = Route::Home;
                self.status_message = None;
            }
            Destination::Login => self.show_login(),
        }
    }

    // =========================================================================
    // Event loop hooks
    // =========================================================================

    /// Called once per UI tick: picks up store changes from other processes
    /// and drains background messages.
    pub fn tick(&mut self) {
        if let Some(ref mut watcher) = self.watcher {
            if watcher.poll() {
                debug!("Session store changed on disk");
                self.holder.on_storage_change();
            }
        }

        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::LoginDone(result) => {
                if let Some(dest) = self.login.complete(result, &mut self.holder) {
                    self.remember_email();
                    self.navigate(dest);
                }
            }
            AppMessage::RegisterDone(result) => {
                if let Some(dest) = self.register.complete(result, &mut self.holder) {
                    if dest == Destination::Login {
                        // The register screen is going away; keep its error visible
                        self.status_message = self.register.error().map(str::to_string);
                        self.login.draft.email = self.register.draft.email.clone();
                    }
                    self.navigate(dest);
                }
            }
            AppMessage::ProfileLoaded(result) => {
                self.profile_loading = false;
                match result {
                    Ok(profile) => self.profile = Some(profile),
                    Err(e) => {
                        warn!(error = %e, "Profile fetch failed");
                        self.status_message = Some(format!("Could not load profile: {}", e));
                    }
                }
            }
            AppMessage::Auth(event) => self.on_auth_event(event),
        }
    }

    /// Re-route after any session change, wherever it came from
    fn on_auth_event(&mut self, event: AuthEvent) {
        debug!(change = ?event.change, authenticated = event.authenticated, "Auth event");
        if event.authenticated {
            if self.route != Route::Home {
                self.navigate(Destination::Home);
            }
        } else {
            self.profile = None;
            if self.route == Route::Home {
                self.show_login();
            }
        }
        self.last_event = Some(event);
    }

    fn remember_email(&mut self) {
        let email = self.holder.session().map(|s| s.email.clone());
        if email.is_some() && email != self.config.last_email {
            self.config.last_email = email;
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a name/email character should be accepted
pub fn can_add_field_char(current_len: usize, c: char) -> bool {
    current_len < MAX_FIELD_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use keyhold_core::{AccessLevel, AuthChange, FileStore, Session};
    use tempfile::TempDir;

    fn sample_session() -> Session {
        Session {
            user_id: "42".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            access_level: AccessLevel::User,
            token: "t1".to_string(),
        }
    }

    /// An app over a session file in `dir`, watching it like the real one
    fn app_over(dir: &TempDir) -> App {
        let store = FileStore::in_dir(dir.path());
        let watcher = StoreWatcher::new(&store);
        let holder = SessionHolder::open(Box::new(store));
        let client = AuthClient::new("http://127.0.0.1:9").expect("client");
        App::with_parts(Config::default(), holder, client, Some(watcher))
    }

    fn other_process(dir: &TempDir) -> SessionHolder {
        SessionHolder::open(Box::new(FileStore::in_dir(dir.path())))
    }

    #[test]
    fn test_starts_on_login_when_logged_out() {
        let dir = TempDir::new().expect("tempdir");
        let app = app_over(&dir);
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.login_focus, LoginFocus::Email);
    }

    #[test]
    fn test_login_elsewhere_routes_home() {
        let dir = TempDir::new().expect("tempdir");
        let mut app = app_over(&dir);

        other_process(&dir).login(sample_session()).expect("login");
        app.tick();

        assert_eq!(app.route, Route::Home);
        assert!(app.holder.is_authenticated());
        let event = app.last_event.as_ref().expect("event");
        assert_eq!(event.change, AuthChange::Reloaded);
        assert!(event.authenticated);
    }

    #[test]
    fn test_logout_elsewhere_routes_to_login() {
        let dir = TempDir::new().expect("tempdir");
        let mut other = other_process(&dir);
        other.login(sample_session()).expect("login");

        let mut app = app_over(&dir);
        assert_eq!(app.route, Route::Home);
        app.profile = Some(Default::default());

        other.logout().expect("logout");
        app.tick();

        assert_eq!(app.route, Route::Login);
        assert!(app.profile.is_none());
        assert!(!app.holder.is_authenticated());
        assert!(!app.last_event.as_ref().expect("event").authenticated);
    }

    #[test]
    fn test_quiet_tick_changes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let mut app = app_over(&dir);
        app.tick();
        assert_eq!(app.route, Route::Login);
        assert!(app.last_event.is_none());
    }

    #[test]
    fn test_register_without_token_moves_to_login() {
        let dir = TempDir::new().expect("tempdir");
        let mut app = app_over(&dir);
        app.show_register();
        app.register.draft.email = "b@c.com".to_string();

        app.handle_message(AppMessage::RegisterDone(Ok(AuthResponse::default())));

        assert_eq!(app.route, Route::Login);
        assert_eq!(app.status_message.as_deref(), Some("No token received from server"));
        assert_eq!(app.login.draft.email, "b@c.com");
        assert_eq!(app.login_focus, LoginFocus::Password);
        assert!(!app.holder.is_authenticated());
    }

    #[test]
    fn test_register_failure_stays_on_register() {
        let dir = TempDir::new().expect("tempdir");
        let mut app = app_over(&dir);
        app.show_register();

        app.handle_message(AppMessage::RegisterDone(Err(AuthError::InvalidCredentials)));

        assert_eq!(app.route, Route::Register);
        assert_eq!(app.register.error(), Some("Invalid email or password"));
        assert!(app.status_message.is_none());
    }

    #[test]
    fn test_logout_key_path_routes_to_login() {
        let dir = TempDir::new().expect("tempdir");
        other_process(&dir).login(sample_session()).expect("login");
        let mut app = app_over(&dir);
        assert_eq!(app.route, Route::Home);

        app.logout();
        app.tick();

        assert_eq!(app.route, Route::Login);
        assert_eq!(app.last_event.as_ref().expect("event").change, AuthChange::LoggedOut);
        assert!(other_process(&dir).session().is_none());
    }

    #[test]
    fn test_login_focus_cycle() {
        assert_eq!(LoginFocus::Email.next(), LoginFocus::Password);
        assert_eq!(LoginFocus::Button.next(), LoginFocus::Email); // Wraps around
        assert_eq!(LoginFocus::Email.prev(), LoginFocus::Button);
    }

    #[test]
    fn test_register_focus_cycle() {
        let mut focus = RegisterFocus::Name;
        for _ in 0..4 {
            focus = focus.next();
        }
        assert_eq!(focus, RegisterFocus::Name);
        assert_eq!(RegisterFocus::Name.prev(), RegisterFocus::Button);
        assert_eq!(RegisterFocus::Password.prev(), RegisterFocus::Email);
    }

    #[test]
    fn test_can_add_field_char() {
        assert!(can_add_field_char(0, 'a'));
        assert!(can_add_field_char(63, '@'));
        // Exceeds max length
        assert!(!can_add_field_char(64, 'a'));
        // Control characters rejected
        assert!(!can_add_field_char(0, '\x00'));
        assert!(!can_add_field_char(0, '\n'));
        assert!(!can_add_field_char(0, '\t'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }
}
