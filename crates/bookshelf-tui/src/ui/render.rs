use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use bookshelf_core::auth::{Surface, UserClaims};

use crate::app::{App, AppState, LoginFocus, Tab};

use super::styles;
use super::tabs::{books, borrows, profile};

const LOGO: [&str; 3] = [
    "  ╔╗ ╔═╗╔═╗╦╔═╔═╗╦ ╦╔═╗╦  ╔═╗",
    "  ╠╩╗║ ║║ ║╠╩╗╚═╗╠═╣║╣ ║  ╠╣ ",
    "  ╚═╝╚═╝╚═╝╩ ╩╚═╝╩ ╩╚═╝╩═╝╚  ",
];

pub fn render(frame: &mut Frame, app: &App) {
    match app.surface() {
        Surface::Loading => render_loading(frame),
        Surface::Public { .. } => render_public(frame, app),
        Surface::Protected { claims } => render_protected(frame, app, &claims),
    }

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame, app),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ReauthRequired => render_reauth_overlay(frame),
        _ => {}
    }
}

fn logo_lines() -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|row| Line::from(Span::styled(*row, styles::heading())))
        .collect()
}

// ============================================================================
// Loading and public surfaces
// ============================================================================

fn render_loading(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 7, frame.area());
    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Checking your session...", styles::dim())));

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn render_public(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(2)])
        .split(frame.area());

    let area = centered_rect_fixed(48, 12, chunks[0]);
    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Welcome to the library",
        styles::text(),
    )));
    lines.push(Line::from(Span::styled(
        "Sign in to browse the catalog and your loans",
        styles::dim(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[l]", styles::key()),
        Span::styled(" Login   ", styles::text()),
        Span::styled("[r]", styles::key()),
        Span::styled(" Register   ", styles::text()),
        Span::styled("[q]", styles::key()),
        Span::styled(" Quit", styles::text()),
    ]));

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);

    render_status_line(frame, app, chunks[1], "[l]ogin | [r]egister | [q]uit");
}

// ============================================================================
// Protected surface
// ============================================================================

fn render_protected(frame: &mut Frame, app: &App, claims: &UserClaims) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, claims, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, claims, chunks[2]);
    render_status_line(frame, app, chunks[3], "[R]efresh | [o] logout | [q]uit");
}

fn render_title_bar(frame: &mut Frame, claims: &UserClaims, area: Rect) {
    let title = format!("  What's up, {}!", claims.username);
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::heading()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.chars().count() + help_hint.len() + 4),
        )),
        Span::styled(help_hint, styles::dim()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::dim());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = [
        ("[1] Books", Tab::Books),
        ("[2] Borrows", Tab::Borrows),
        ("[3] Profile", Tab::Profile),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (i, (label, tab)) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::dim()));
        }
        spans.push(Span::styled(*label, styles::tab(app.current_tab == *tab)));
    }

    // Search query on the right of the Books tab
    if app.current_tab == Tab::Books && (app.state == AppState::Searching || !app.search_query.is_empty()) {
        let cursor = if app.state == AppState::Searching { "▌" } else { "" };
        let search = format!("Search: {}{}", app.search_query, cursor);
        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let padding = (area.width as usize).saturating_sub(used + search.chars().count() + 2);
        spans.push(Span::raw(" ".repeat(padding)));
        spans.push(Span::styled(search, styles::notice()));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::dim());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, claims: &UserClaims, area: Rect) {
    match app.current_tab {
        Tab::Books => books::render(frame, app, area),
        Tab::Borrows => borrows::render(frame, app, area),
        Tab::Profile => profile::render(frame, app, claims, area),
    }
}

fn render_status_line(frame: &mut Frame, app: &App, area: Rect, shortcuts: &str) {
    let left_text = match (&app.status_message, app.loading) {
        (Some(msg), _) => format!(" {} ", msg),
        (None, true) => " Loading... ".to_string(),
        (None, false) => String::new(),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::dim()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::dim()),
    ]);

    frame.render_widget(Paragraph::new(status_line).style(styles::status_bar()), area);
}

// ============================================================================
// Overlays
// ============================================================================

fn render_help_overlay(frame: &mut Frame, app: &App) {
    let bindings: &[(&str, &str)] = if app.surface().is_protected() {
        &[
            ("Tab/1-3", "Switch tab"),
            ("j/k ↑/↓", "Move selection"),
            ("PgUp/PgDn", "Scroll a page"),
            ("/", "Search books by title"),
            ("Enter", "Show book details"),
            ("b", "Borrow selected book"),
            ("h", "Toggle loan history"),
            ("R", "Refresh data"),
            ("o", "Logout"),
            ("q", "Quit"),
        ]
    } else {
        &[("l", "Login"), ("r", "Register"), ("q", "Quit")]
    };

    let height = bindings.len() as u16 + 5;
    let area = centered_rect_fixed(44, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    for (key, desc) in bindings {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<12}", key), styles::key()),
            Span::styled(*desc, styles::text()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("  Press ? or Esc to close", styles::dim())));

    let block = Block::default()
        .title(" Help ")
        .title_style(styles::heading())
        .borders(Borders::ALL)
        .border_style(styles::border(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 14 } else { 12 };
    let area = centered_rect_fixed(46, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));

    let field = |label: &str, value: String, focused: bool| {
        let style = if focused {
            styles::selected()
        } else {
            styles::text()
        };
        let cursor = if focused { "▌" } else { "" };
        Line::from(vec![
            Span::raw("      "),
            Span::styled(format!("{}: [", label), styles::dim()),
            Span::styled(format!("{:<16}{}", value, cursor), style),
            Span::styled("]", styles::dim()),
        ])
    };

    // Keep the tail of long usernames visible while typing
    let overflow = app.login_username.chars().count().saturating_sub(16);
    let username: String = app.login_username.chars().skip(overflow).collect();
    lines.push(field("Username", username, app.login_focus == LoginFocus::Username));
    let masked = "*".repeat(app.login_password.chars().count().min(16));
    lines.push(field("Password", masked, app.login_focus == LoginFocus::Password));

    let button_focused = app.login_focus == LoginFocus::Button;
    let (label, style) = if button_focused {
        (" ▶ Login ◀ ", styles::selected())
    } else {
        ("   Login   ", styles::text())
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(label, style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::alert())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_reauth_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Your session has expired.",
            styles::notice(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  [Enter]", styles::key()),
            Span::styled(" Sign in again   ", styles::text()),
            Span::styled("[q]", styles::key()),
            Span::styled(" Quit", styles::text()),
        ]),
    ];

    let block = Block::default()
        .title(" Sign in required ")
        .title_style(styles::alert())
        .borders(Borders::ALL)
        .border_style(styles::border(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
