//! Borrows tab - current loans or loan history.

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use bookshelf_core::models::Borrow;

use crate::app::{App, BorrowView};
use crate::ui::styles;
use crate::utils::format::{format_date, format_due, truncate_string};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let borrows = app.visible_borrows();
    let now = Utc::now();

    let header = Row::new([
        Cell::from("Title"),
        Cell::from("Borrowed"),
        Cell::from("Due"),
        Cell::from("Status"),
    ])
    .style(styles::heading())
    .height(1);

    let rows: Vec<Row> = borrows
        .iter()
        .map(|borrow| {
            Row::new(vec![
                Cell::from(truncate_string(&borrow.book.title, 40)),
                Cell::from(format_date(&borrow.borrow_date)),
                Cell::from(format_date(&borrow.due_date)),
                Cell::from(status_span(borrow, now)),
            ])
            .style(styles::text())
        })
        .collect();

    let widths = [
        Constraint::Fill(3),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Fill(1),
    ];

    let (label, toggle) = match app.borrow_view {
        BorrowView::Current => ("Current loans", "[h]istory"),
        BorrowView::History => ("Loan history", "[h] current"),
    };
    let title = format!(" {} ({}) - {} ", label, borrows.len(), toggle);

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::dim())
                .borders(Borders::ALL)
                .border_style(styles::border(true)),
        )
        .row_highlight_style(styles::selected());

    let mut state = TableState::default();
    if !borrows.is_empty() {
        state.select(Some(app.borrow_selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn status_span(borrow: &Borrow, now: chrono::DateTime<Utc>) -> Span<'static> {
    if let Some(returned) = borrow.return_date {
        return Span::styled(format!("Returned {}", format_date(&returned)), styles::dim());
    }
    let due = format_due(borrow.days_until_due(now));
    let late = borrow.is_late(now);
    let text = if late {
        due
    } else {
        format!("{} ({})", borrow.status.label(), due)
    };
    Span::styled(text, styles::loan(late))
}
