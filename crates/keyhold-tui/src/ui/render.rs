use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, RegisterFocus, Route};

use super::styles;

/// Width of a text field's visible area
const FIELD_WIDTH: usize = 20;

const LOGO: [&str; 3] = [
    "     ╦╔═╔═╗╦ ╦╦ ╦╔═╗╦  ╔╦╗",
    "     ╠╩╗║╣ ╚╦╝╠═╣║ ║║   ║║",
    "     ╩ ╩╚═╝ ╩ ╩ ╩╚═╝╩═╝═╩╝",
];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    match app.route {
        Route::Home => render_home(frame, app, chunks[1]),
        Route::Login => render_login_form(frame, app),
        Route::Register => render_register_form(frame, app),
    }
    render_status_bar(frame, app, chunks[2]);

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  keyhold";
    let who = match app.holder.session() {
        Some(session) => format!("{} ({})", session.email, session.access_level),
        None => "not signed in".to_string(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + who.chars().count() + 4),
        )),
        Span::styled(who, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.route {
        Route::Home => "[l] Logout  [r] Refresh  [p] Profile  [q] Quit",
        Route::Login => "[Tab] Next  [Enter] Select  [Ctrl-R] Register  [Esc] Quit",
        Route::Register => "[Tab] Next  [Enter] Select  [Ctrl-R] Login  [Esc] Back",
    };

    let mut spans = vec![Span::styled(format!(" {}", hints), styles::muted_style())];
    if let Some(ref message) = app.status_message {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(message.clone(), styles::highlight_style()));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_home(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];

    match app.holder.session() {
        Some(session) => {
            lines.push(Line::from(Span::styled(
                format!("  Welcome, {}", display_or(&session.name, "friend")),
                styles::title_style(),
            )));
            lines.push(Line::from(""));
            lines.push(detail_line("Email", display_or(&session.email, "-")));
            lines.push(detail_line("Access", session.access_level.as_str()));
            lines.push(detail_line("User ID", &session.user_id));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "  Not signed in",
                styles::muted_style(),
            )));
        }
    }

    lines.push(Line::from(""));
    if app.profile_loading {
        lines.push(Line::from(Span::styled("  Loading profile...", styles::muted_style())));
    } else if let Some(ref profile) = app.profile {
        lines.push(Line::from(Span::styled(" Profile", styles::highlight_style())));
        lines.push(detail_line("Name", &profile.display_name()));
        if let Some(ref phone) = profile.phone_number {
            lines.push(detail_line("Phone", phone));
        }
        if !profile.roles.is_empty() {
            lines.push(detail_line("Roles", &profile.roles.join(", ")));
        }
        if let Some(ref created) = profile.created_date {
            lines.push(detail_line("Member since", created));
        }
    }

    if let Some(ref event) = app.last_event {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(
                "  Last session change: {:?} at {} (rev {})",
                event.change,
                event.at.format("%H:%M:%S"),
                event.revision
            ),
            styles::muted_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(Span::styled(" Account ", styles::title_style()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_login_form(frame: &mut Frame, app: &App) {
    let form = &app.login;
    let height = if form.error().is_some() { 13 } else { 11 };
    let area = centered_rect_fixed(46, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line(
        "   Email: [",
        &form.draft.email,
        app.login_focus == LoginFocus::Email,
        false,
    ));
    lines.push(field_line(
        "Password: [",
        &form.draft.password,
        app.login_focus == LoginFocus::Password,
        true,
    ));
    lines.push(Line::from(""));
    lines.push(button_line(
        "Sign in",
        app.login_focus == LoginFocus::Button,
        form.is_submitting(),
    ));

    if let Some(error) = form.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    render_dialog(frame, area, lines);
}

fn render_register_form(frame: &mut Frame, app: &App) {
    let form = &app.register;
    let height = if form.error().is_some() { 14 } else { 12 };
    let area = centered_rect_fixed(46, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line(
        "    Name: [",
        &form.draft.name,
        app.register_focus == RegisterFocus::Name,
        false,
    ));
    lines.push(field_line(
        "   Email: [",
        &form.draft.email,
        app.register_focus == RegisterFocus::Email,
        false,
    ));
    lines.push(field_line(
        "Password: [",
        &form.draft.password,
        app.register_focus == RegisterFocus::Password,
        true,
    ));
    lines.push(Line::from(""));
    lines.push(button_line(
        "Create account",
        app.register_focus == RegisterFocus::Button,
        form.is_submitting(),
    ));

    if let Some(error) = form.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    render_dialog(frame, area, lines);
}

fn logo_lines() -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|row| Line::from(Span::styled(*row, styles::title_style())))
        .collect()
}

fn field_line(label: &'static str, value: &str, focused: bool, masked: bool) -> Line<'static> {
    let shown: String = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    // Keep the tail visible once the value outgrows the box
    let skip = shown.chars().count().saturating_sub(FIELD_WIDTH);
    let visible: String = shown.chars().skip(skip).collect();
    let cursor = if focused { "▌" } else { "" };

    Line::from(vec![
        Span::raw("   "),
        Span::styled(label, styles::muted_style()),
        Span::styled(
            format!("{:<width$}{}", visible, cursor, width = FIELD_WIDTH),
            styles::field_style(focused),
        ),
        Span::styled("]", styles::muted_style()),
    ])
}

fn button_line(label: &str, focused: bool, submitting: bool) -> Line<'static> {
    let text = if submitting {
        "  Submitting...  ".to_string()
    } else if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    let style = if submitting {
        styles::muted_style()
    } else {
        styles::field_style(focused)
    };
    let pad = 22usize.saturating_sub(text.chars().count() / 2);

    Line::from(vec![
        Span::raw(format!("{}[", " ".repeat(pad))),
        Span::styled(text, style),
        Span::raw("]"),
    ])
}

fn detail_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<14}", label), styles::muted_style()),
        Span::styled(value.to_string(), styles::success_style()),
    ])
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn render_dialog(frame: &mut Frame, area: Rect, lines: Vec<Line>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    // Fixed size dialog matching the forms
    let area = centered_rect_fixed(46, 9, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Are you sure you want to quit?",
        styles::highlight_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" to quit, ", styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ]));

    render_dialog(frame, area, lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_password_field_is_masked() {
        let line = field_line("Password: [", "hunter2", false, true);
        let rendered = text(&line);
        assert!(rendered.contains("*******"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_long_value_keeps_tail() {
        let value = "someone.with.a.long.address@example.com";
        let rendered = text(&field_line("   Email: [", value, true, false));
        assert!(rendered.contains("address@example.com▌"));
        assert!(!rendered.contains("someone"));
    }

    #[test]
    fn test_button_shows_submitting() {
        assert!(text(&button_line("Sign in", true, true)).contains("Submitting..."));
        assert!(text(&button_line("Sign in", true, false)).contains("▶ Sign in ◀"));
    }

    #[test]
    fn test_centered_rect_fits_small_area() {
        let r = centered_rect_fixed(46, 12, Rect::new(0, 0, 30, 10));
        assert_eq!(r.width, 30);
        assert_eq!(r.height, 10);
    }
}
