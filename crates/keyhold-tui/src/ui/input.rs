//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{
    can_add_field_char, can_add_password_char, App, AppState, LoginFocus, RegisterFocus, Route,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    match app.route {
        Route::Home => handle_home_input(app, key),
        Route::Login => handle_login_input(app, key),
        Route::Register => handle_register_input(app, key),
    }
}

fn handle_home_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('l') => app.logout(),
        KeyCode::Char('r') => {
            app.status_message = None;
            app.request_refresh();
        }
        KeyCode::Char('p') => app.fetch_profile(),
        _ => {}
    }
    false
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r') {
        app.status_message = None;
        app.show_register();
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email | LoginFocus::Password => {
                app.login_focus = app.login_focus.next();
            }
            LoginFocus::Button => {
                // Ignored while a request is in flight
                app.submit_login();
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login.draft.email.pop();
            }
            LoginFocus::Password => {
                app.login.draft.password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_field_char(app.login.draft.email.chars().count(), c) {
                    app.login.draft.email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login.draft.password.chars().count(), c) {
                    app.login.draft.password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    false
}

fn handle_register_input(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r') {
        app.show_login();
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            // Back to the login screen
            app.show_login();
        }
        KeyCode::Down | KeyCode::Tab => {
            app.register_focus = app.register_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.register_focus = app.register_focus.prev();
        }
        KeyCode::Enter => match app.register_focus {
            RegisterFocus::Button => app.submit_register(),
            _ => app.register_focus = app.register_focus.next(),
        },
        KeyCode::Backspace => {
            if let Some(field) = register_field(app) {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            let masked = app.register_focus == RegisterFocus::Password;
            if let Some(field) = register_field(app) {
                let len = field.chars().count();
                let accepted = if masked {
                    can_add_password_char(len, c)
                } else {
                    can_add_field_char(len, c)
                };
                if accepted {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
    false
}

/// The register draft field under focus, if any
fn register_field(app: &mut App) -> Option<&mut String> {
    let draft = &mut app.register.draft;
    match app.register_focus {
        RegisterFocus::Name => Some(&mut draft.name),
        RegisterFocus::Email => Some(&mut draft.email),
        RegisterFocus::Password => Some(&mut draft.password),
        RegisterFocus::Button => None,
    }
}
