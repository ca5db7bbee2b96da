//! Keyboard input handling for the TUI.
//!
//! Keys are dispatched by overlay state first, then by the surface the
//! access gate currently allows.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use bookshelf_core::auth::Surface;

use crate::app::{
    can_add_password_char, can_add_username_char, App, AppState, BorrowView, LoginFocus, Tab,
    PAGE_SCROLL_SIZE,
};

/// Maximum length of the book search query
const MAX_SEARCH_LENGTH: usize = 100;

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ReauthRequired => return handle_reauth_input(app, key).await,
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    match app.surface() {
        Surface::Loading => Ok(is_quit_key(key)),
        Surface::Public { .. } => handle_public_input(app, key).await,
        Surface::Protected { .. } => handle_protected_input(app, key).await,
    }
}

fn is_quit_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
}

async fn handle_public_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Char('l') | KeyCode::Enter => app.start_login(),
        KeyCode::Char('r') => app.register().await,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        _ => {}
    }
    Ok(false)
}

async fn handle_protected_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('o') => app.logout().await,
        KeyCode::Char('R') => app.refresh_all_background(),

        // Tab navigation
        KeyCode::Tab => app.current_tab = app.current_tab.next(),
        KeyCode::BackTab => app.current_tab = app.current_tab.prev(),
        KeyCode::Char('1') => app.current_tab = Tab::Books,
        KeyCode::Char('2') => app.current_tab = Tab::Borrows,
        KeyCode::Char('3') => app.current_tab = Tab::Profile,

        // List navigation
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => app.move_selection(isize::MIN / 2),
        KeyCode::End => app.move_selection(isize::MAX / 2),

        _ => match app.current_tab {
            Tab::Books => handle_books_input(app, key),
            Tab::Borrows => handle_borrows_input(app, key),
            Tab::Profile => {}
        },
    }
    Ok(false)
}

fn handle_books_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('/') => app.state = AppState::Searching,
        KeyCode::Enter => app.fetch_selected_book(),
        KeyCode::Char('b') => app.borrow_selected_book(),
        _ => {}
    }
}

fn handle_borrows_input(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('h') {
        app.borrow_view = match app.borrow_view {
            BorrowView::Current => BorrowView::History,
            BorrowView::History => BorrowView::Current,
        };
        app.borrow_selection = 0;
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
        }
        KeyCode::Enter => {
            app.state = AppState::Normal;
            app.book_selection = 0;
            app.selected_book = None;
            app.fetch_books();
        }
        KeyCode::Backspace => {
            app.search_query.pop();
        }
        KeyCode::Char(c) => {
            if app.search_query.chars().count() < MAX_SEARCH_LENGTH && !c.is_control() {
                app.search_query.push(c);
            }
        }
        _ => {}
    }
}

async fn handle_reauth_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Enter | KeyCode::Char('l') => app.confirm_reauth().await,
        KeyCode::Char('q') => {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        _ => {}
    }
    Ok(false)
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Back to the public landing
            app.state = AppState::Normal;
            app.login_error = None;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                // On success the session restarts and data loads once it is ready
                app.attempt_login().await;
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}
