use chrono::Utc;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use bookshelf_core::auth::UserClaims;

use crate::app::App;
use crate::ui::styles;
use crate::utils::format::format_optional;

pub fn render(frame: &mut Frame, app: &App, claims: &UserClaims, area: Rect) {
    let label = |text: &str| Span::styled(format!("  {:<16}", text), styles::dim());

    let session = match app.sessions.snapshot().token_expiry() {
        Some(expiry) => {
            let secs = (expiry - Utc::now()).num_seconds().max(0);
            format!("token valid for {}m {:02}s", secs / 60, secs % 60)
        }
        None => "-".to_string(),
    };

    let now = Utc::now();
    let late = app.borrows.current.iter().filter(|b| b.is_late(now)).count();
    let loans = if late > 0 {
        Span::styled(
            format!("{} out, {} late", app.borrows.current.len(), late),
            styles::alert(),
        )
    } else {
        Span::raw(format!("{} out", app.borrows.current.len()))
    };

    let lines = vec![
        Line::from(""),
        Line::from(vec![label("Name"), Span::styled(claims.display_name.clone(), styles::heading())]),
        Line::from(vec![label("Username"), Span::raw(claims.username.clone())]),
        Line::from(vec![label("Email"), Span::raw(format_optional(&claims.email, "-"))]),
        Line::from(vec![label("Loans"), loans]),
        Line::from(vec![label("Session"), Span::raw(session)]),
        Line::from(""),
        Line::from(vec![label("Account"), Span::styled(app.sessions.account_url(), styles::notice())]),
    ];

    let block = Block::default()
        .title(" Profile ")
        .title_style(styles::dim())
        .borders(Borders::ALL)
        .border_style(styles::border(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
