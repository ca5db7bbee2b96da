//! Books tab - the catalog table with a detail panel for the selection.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use bookshelf_core::models::Book;

use crate::app::App;
use crate::ui::styles;
use crate::utils::format::{format_date, format_optional, truncate_string};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_book_table(frame, app, chunks[0]);
    render_book_detail(frame, app, chunks[1]);
}

fn render_book_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([
        Cell::from("Title"),
        Cell::from("Author"),
        Cell::from("Category"),
        Cell::from("Qty"),
    ])
    .style(styles::heading())
    .height(1);

    let rows: Vec<Row> = app
        .books
        .iter()
        .map(|book| {
            let qty_style = styles::availability(book.is_available());
            Row::new(vec![
                Cell::from(truncate_string(&book.title, 40)),
                Cell::from(truncate_string(&book.main_author.name, 24)),
                Cell::from(format_optional(&book.category, "-")),
                Cell::from(Span::styled(format!("{:>3}", book.quantity), qty_style)),
            ])
            .style(styles::text())
        })
        .collect();

    let widths = [
        Constraint::Fill(3),
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Length(4),
    ];

    let title = format!(" Books ({}) - [/] search [b]orrow ", app.books.len());

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
    if !app.books.is_empty() {
        state.select(Some(app.book_selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_book_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Details ")
        .title_style(styles::dim())
        .borders(Borders::ALL)
        .border_style(styles::border(false));

    // Prefer the freshly fetched record when it matches the selection
    let selected = app.books.get(app.book_selection);
    let book = match (&app.selected_book, selected) {
        (Some(detail), Some(row)) if detail.id == row.id => Some(detail),
        (_, row) => row,
    };

    let lines = match book {
        Some(book) => detail_lines(book),
        None if app.loading => vec![Line::from(Span::styled("Loading...", styles::dim()))],
        None => vec![Line::from(Span::styled("No books found", styles::dim()))],
    };

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn detail_lines(book: &Book) -> Vec<Line<'static>> {
    let label = |text: &str| Span::styled(format!("{:<10}", text), styles::dim());

    let stock = if book.is_available() {
        format!("{} available", book.quantity)
    } else {
        "Out of stock".to_string()
    };
    let availability = Span::styled(stock, styles::availability(book.is_available()));

    let mut lines = vec![
        Line::from(Span::styled(book.title.clone(), styles::heading())),
        Line::from(""),
        Line::from(vec![label("Authors"), Span::raw(book.author_names())]),
        Line::from(vec![label("Category"), Span::raw(format_optional(&book.category, "-"))]),
        Line::from(vec![label("Stock"), availability]),
    ];

    if let Some(added) = book.created_at {
        lines.push(Line::from(vec![label("Added"), Span::raw(format_date(&added))]));
    }

    if let Some(description) = book.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::raw(description.to_string())));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Enter] reload details",
        styles::dim(),
    )));
    lines
}
