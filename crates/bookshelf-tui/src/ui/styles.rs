//! Palette for the bookshelf views.

use ratatui::style::{Color, Modifier, Style};

const BRAND: Color = Color::Rgb(70, 130, 180);
const IN_STOCK: Color = Color::Rgb(96, 160, 96);
const NOTICE: Color = Color::Rgb(200, 160, 72);
const ALERT: Color = Color::Rgb(192, 64, 64);
const DIM: Color = Color::Rgb(128, 128, 128);
const SELECTION_BG: Color = Color::Rgb(44, 48, 64);
const STATUS_BG: Color = Color::Rgb(32, 32, 40);

pub fn heading() -> Style {
    Style::default().fg(BRAND).add_modifier(Modifier::BOLD)
}

pub fn selected() -> Style {
    Style::default().bg(SELECTION_BG).add_modifier(Modifier::BOLD)
}

pub fn text() -> Style {
    Style::default().fg(Color::White)
}

pub fn dim() -> Style {
    Style::default().fg(DIM)
}

/// Search input and things the user should look at
pub fn notice() -> Style {
    Style::default().fg(NOTICE)
}

pub fn alert() -> Style {
    Style::default().fg(ALERT)
}

/// Key names in hints and help
pub fn key() -> Style {
    notice().add_modifier(Modifier::BOLD)
}

pub fn tab(selected: bool) -> Style {
    if selected {
        heading().add_modifier(Modifier::UNDERLINED)
    } else {
        dim()
    }
}

pub fn border(focused: bool) -> Style {
    if focused {
        Style::default().fg(BRAND)
    } else {
        dim()
    }
}

pub fn status_bar() -> Style {
    Style::default().bg(STATUS_BG).fg(Color::White)
}

/// Stock figures: green while copies remain
pub fn availability(available: bool) -> Style {
    if available {
        Style::default().fg(IN_STOCK)
    } else {
        alert()
    }
}

/// Open loans: red once past due
pub fn loan(late: bool) -> Style {
    if late {
        alert()
    } else {
        Style::default().fg(IN_STOCK)
    }
}
