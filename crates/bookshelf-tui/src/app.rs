//! Application state management for Bookshelf.
//!
//! This module contains the `App` struct that owns the session, the catalog
//! client, UI state and loaded data, and coordinates background fetches.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bookshelf_core::api::{
    ApiError, BookQuery, BorrowOverview, CatalogClient, HttpTransport, RequestAuthorizer, Transport,
};
use bookshelf_core::auth::{
    AccessGate, CredentialStore, GateAction, IdentityProvider, LoginOptions, ProviderError,
    ProviderRedirect, SessionManager, SessionStatus, Surface,
};
use bookshelf_core::keycloak::{KeycloakClient, TokenStore};
use bookshelf_core::models::{Book, Borrow};
use bookshelf_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

const REAUTH_MESSAGE: &str = "Session expired - please sign in again";

// ============================================================================
// UI State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    LoggingIn,
    /// A request was rejected for session reasons; the user must sign in again
    ReauthRequired,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Books,
    Borrows,
    Profile,
}

impl Tab {
    pub fn next(self) -> Self {
        match self {
            Tab::Books => Tab::Borrows,
            Tab::Borrows => Tab::Profile,
            Tab::Profile => Tab::Books,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Tab::Books => Tab::Profile,
            Tab::Borrows => Tab::Books,
            Tab::Profile => Tab::Borrows,
        }
    }
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Which borrow list is shown on the Borrows tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowView {
    Current,
    History,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from background tasks. Every variant carries the
/// session epoch it was started under.
enum BackgroundResult {
    SessionReady(u64, SessionStatus),
    Books(u64, Result<Vec<Book>, ApiError>),
    BookDetail(u64, Result<Book, ApiError>),
    Borrows(u64, Result<BorrowOverview, ApiError>),
    Borrowed(u64, Result<Borrow, ApiError>),
}

impl BackgroundResult {
    fn epoch(&self) -> u64 {
        match self {
            BackgroundResult::SessionReady(epoch, _)
            | BackgroundResult::Books(epoch, _)
            | BackgroundResult::BookDetail(epoch, _)
            | BackgroundResult::Borrows(epoch, _)
            | BackgroundResult::Borrowed(epoch, _) => *epoch,
        }
    }
}

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    provider: Arc<dyn IdentityProvider>,
    transport: Arc<dyn Transport>,
    pub sessions: Arc<SessionManager>,
    pub catalog: CatalogClient,
    /// Bumped whenever the session is replaced or ended; results from older
    /// epochs are discarded
    epoch: u64,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub search_query: String,
    pub borrow_view: BorrowView,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Selection indices
    pub book_selection: usize,
    pub borrow_selection: usize,

    // Data
    pub books: Vec<Book>,
    pub selected_book: Option<Book>,
    pub borrows: BorrowOverview,
    pub loading: bool,

    // Background task channel
    refresh_rx: mpsc::Receiver<BackgroundResult>,
    refresh_tx: mpsc::Sender<BackgroundResult>,

    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance wired to Keycloak and the catalog API
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir().context("Failed to resolve cache directory")?;
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(KeycloakClient::new(config.keycloak(), TokenStore::new(cache_dir))?);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.api_url)?);
        Ok(Self::with_services(config, provider, transport))
    }

    pub fn with_services(
        config: Config,
        provider: Arc<dyn IdentityProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(provider.clone()));
        let catalog = Self::build_catalog(&config, &sessions, &transport);
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        // Get credentials from env vars or config
        let login_username = std::env::var("BOOKSHELF_USERNAME")
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let login_password = std::env::var("BOOKSHELF_PASSWORD")
            .ok()
            .or_else(|| CredentialStore::get_password(&login_username))
            .unwrap_or_default();

        Self {
            config,
            provider,
            transport,
            sessions,
            catalog,
            epoch: 0,

            state: AppState::Normal,
            current_tab: Tab::Books,
            search_query: String::new(),
            borrow_view: BorrowView::Current,

            login_username,
            login_password,
            login_focus: LoginFocus::Username,
            login_error: None,

            book_selection: 0,
            borrow_selection: 0,

            books: Vec::new(),
            selected_book: None,
            borrows: BorrowOverview::default(),
            loading: false,

            refresh_rx: rx,
            refresh_tx: tx,

            status_message: None,
        }
    }

    fn build_catalog(
        config: &Config,
        sessions: &Arc<SessionManager>,
        transport: &Arc<dyn Transport>,
    ) -> CatalogClient {
        let authorizer = RequestAuthorizer::new(
            sessions.clone(),
            transport.clone(),
            config.refresh_threshold_secs,
        );
        CatalogClient::new(Arc::new(authorizer))
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Which surface the gate allows right now
    pub fn surface(&self) -> Surface {
        AccessGate::surface(&self.sessions.snapshot())
    }

    /// Initialize the current session in the background.
    pub fn start_session(&mut self) {
        let epoch = self.epoch;
        let sessions = self.sessions.clone();
        let tx = self.refresh_tx.clone();

        tokio::spawn(async move {
            let status = sessions.initialize().await;
            let _ = tx.send(BackgroundResult::SessionReady(epoch, status)).await;
        });
    }

    /// Replace the session with a fresh one and initialize it, picking up
    /// whatever the provider now holds.
    fn restart_session(&mut self) {
        self.epoch += 1;
        self.sessions = Arc::new(SessionManager::new(self.provider.clone()));
        self.catalog = Self::build_catalog(&self.config, &self.sessions, &self.transport);
        self.clear_data();
        self.start_session();
    }

    fn allows(&self, action: GateAction) -> bool {
        AccessGate::allows(&self.surface(), action)
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        if !self.allows(GateAction::Login) {
            return;
        }
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return;
        }

        self.login_error = None;
        let options = LoginOptions {
            username: username.clone(),
            password: password.clone(),
        };

        match self.sessions.login(&options).await {
            Ok(ProviderRedirect::Completed) => {
                if let Err(e) = CredentialStore::store(&username, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }

                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.state = AppState::Normal;
                self.status_message = None;
                info!("Login successful");
                self.restart_session();
            }
            Ok(ProviderRedirect::Visit(url)) => {
                self.state = AppState::Normal;
                self.status_message = Some(format!("Continue signing in at {}", url));
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_error = Some(Self::login_error_message(&e));
                if matches!(e, ProviderError::Rejected(_)) {
                    if let Err(e) = CredentialStore::delete(&username) {
                        debug!(error = %e, "No stored credentials to forget");
                    }
                }
            }
        }
    }

    fn login_error_message(err: &ProviderError) -> String {
        match err {
            ProviderError::Rejected(_) => "Invalid username or password".to_string(),
            ProviderError::Unreachable(_) => {
                "Unable to reach the sign-in server. Check your connection.".to_string()
            }
            other => format!("Login failed: {}", other),
        }
    }

    pub async fn register(&mut self) {
        if !self.allows(GateAction::Register) {
            return;
        }
        match self.sessions.register().await {
            Ok(ProviderRedirect::Visit(url)) => {
                self.status_message = Some(format!("Create your account at {}", url));
            }
            Ok(ProviderRedirect::Completed) => self.restart_session(),
            Err(e) => {
                error!(error = %e, "Registration failed");
                self.status_message = Some(format!("Registration unavailable: {}", e));
            }
        }
    }

    pub async fn logout(&mut self) {
        if !self.allows(GateAction::Logout) {
            return;
        }
        // Invalidate in-flight fetches before the session goes away
        self.epoch += 1;
        self.sessions.logout().await;
        self.clear_data();
        self.state = AppState::Normal;
        self.current_tab = Tab::Books;
        self.status_message = Some("Signed out".to_string());
    }

    /// Leave the re-authentication prompt: end the session so the public
    /// surface with its login trigger is shown.
    pub async fn confirm_reauth(&mut self) {
        self.logout().await;
        self.status_message = None;
        self.start_login();
    }

    fn clear_data(&mut self) {
        self.books.clear();
        self.selected_book = None;
        self.borrows = BorrowOverview::default();
        self.book_selection = 0;
        self.borrow_selection = 0;
        self.loading = false;
    }

    // =========================================================================
    // Data Fetching
    // =========================================================================

    /// Fetch books and borrows in the background
    pub fn refresh_all_background(&mut self) {
        self.fetch_books();
        self.fetch_borrows();
        self.status_message = Some("Refreshing data...".to_string());
    }

    pub fn fetch_books(&mut self) {
        let epoch = self.epoch;
        let catalog = self.catalog.clone();
        let query = BookQuery::title(self.search_query.trim());
        let tx = self.refresh_tx.clone();
        self.loading = true;

        tokio::spawn(async move {
            let result = catalog.fetch_books(&query).await;
            let _ = tx.send(BackgroundResult::Books(epoch, result)).await;
        });
    }

    pub fn fetch_borrows(&mut self) {
        let epoch = self.epoch;
        let catalog = self.catalog.clone();
        let tx = self.refresh_tx.clone();

        tokio::spawn(async move {
            let result = catalog.fetch_borrow_overview().await;
            let _ = tx.send(BackgroundResult::Borrows(epoch, result)).await;
        });
    }

    pub fn fetch_selected_book(&mut self) {
        let Some(id) = self.books.get(self.book_selection).map(|b| b.id) else {
            return;
        };
        let epoch = self.epoch;
        let catalog = self.catalog.clone();
        let tx = self.refresh_tx.clone();

        tokio::spawn(async move {
            let result = catalog.fetch_book(id).await;
            let _ = tx.send(BackgroundResult::BookDetail(epoch, result)).await;
        });
    }

    pub fn borrow_selected_book(&mut self) {
        let Some(book) = self.books.get(self.book_selection) else {
            return;
        };
        if !book.is_available() {
            self.status_message = Some(format!("\"{}\" is out of stock", book.title));
            return;
        }
        let book_id = book.id;
        let epoch = self.epoch;
        let catalog = self.catalog.clone();
        let tx = self.refresh_tx.clone();

        tokio::spawn(async move {
            let result = catalog.borrow_book(book_id).await;
            let _ = tx.send(BackgroundResult::Borrowed(epoch, result)).await;
        });
    }

    /// Drain completed background tasks
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.refresh_rx.try_recv() {
            self.process_background_result(result);
        }
    }

    fn process_background_result(&mut self, result: BackgroundResult) {
        if result.epoch() != self.epoch {
            debug!(epoch = result.epoch(), current = self.epoch, "Discarding stale result");
            return;
        }

        if let BackgroundResult::SessionReady(_, status) = result {
            info!(?status, "Session ready");
            if status.is_authenticated() {
                self.refresh_all_background();
            }
            return;
        }

        // Responses that land after the session ended are not applied
        if !self.sessions.status().is_authenticated() {
            debug!("Discarding result received without an active session");
            return;
        }

        match result {
            BackgroundResult::SessionReady(..) => {}
            BackgroundResult::Books(_, result) => {
                self.loading = false;
                if let Some(books) = self.accept(result, "books") {
                    self.book_selection = self.book_selection.min(books.len().saturating_sub(1));
                    self.books = books;
                    self.status_message = None;
                }
            }
            BackgroundResult::BookDetail(_, result) => {
                if let Some(book) = self.accept(result, "book detail") {
                    self.selected_book = Some(book);
                }
            }
            BackgroundResult::Borrows(_, result) => {
                if let Some(borrows) = self.accept(result, "borrows") {
                    self.borrows = borrows;
                    self.borrow_selection = 0;
                }
            }
            BackgroundResult::Borrowed(_, result) => {
                if let Some(borrow) = self.accept(result, "borrow") {
                    self.status_message = Some(format!("Borrowed \"{}\"", borrow.book.title));
                    self.fetch_books();
                    self.fetch_borrows();
                }
            }
        }
    }

    /// Unwrap a fetch result, turning session failures into the
    /// re-authentication prompt and everything else into a status message.
    fn accept<T>(&mut self, result: Result<T, ApiError>, what: &str) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) if e.needs_reauthentication() => {
                warn!(error = %e, what, "Request needs re-authentication");
                self.state = AppState::ReauthRequired;
                self.status_message = Some(REAUTH_MESSAGE.to_string());
                None
            }
            Err(e) => {
                error!(error = %e, what, "Request failed");
                self.status_message = Some(format!("Failed to load {}: {}", what, e));
                None
            }
        }
    }

    // =========================================================================
    // Selection helpers
    // =========================================================================

    pub fn visible_borrows(&self) -> &[Borrow] {
        match self.borrow_view {
            BorrowView::Current => &self.borrows.current,
            BorrowView::History => &self.borrows.history,
        }
    }

    pub fn selection_len(&self) -> usize {
        match self.current_tab {
            Tab::Books => self.books.len(),
            Tab::Borrows => self.visible_borrows().len(),
            Tab::Profile => 0,
        }
    }

    fn selection_mut(&mut self) -> Option<&mut usize> {
        match self.current_tab {
            Tab::Books => Some(&mut self.book_selection),
            Tab::Borrows => Some(&mut self.borrow_selection),
            Tab::Profile => None,
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.selection_len();
        if len == 0 {
            return;
        }
        if let Some(selection) = self.selection_mut() {
            let next = (*selection as isize + delta).clamp(0, len as isize - 1);
            *selection = next as usize;
        }
        if self.current_tab == Tab::Books {
            self.selected_book = None;
        }
    }
}

/// Check if a character can be added to the username field
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && !c.is_control()
}

/// Check if a character can be added to the password field
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && !c.is_control()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bookshelf_core::api::{ApiResponse, AuthorizedRequest};
    use bookshelf_core::auth::{InitOptions, ProviderToken, RefreshError, TokenClaims};
    use bookshelf_core::models::Author;
    use chrono::{Duration, Utc};

    use super::*;

    /// Provider that always reports an active session for "alice".
    struct SignedInProvider;

    #[async_trait]
    impl IdentityProvider for SignedInProvider {
        async fn init(&self, _options: &InitOptions) -> Result<bool, ProviderError> {
            Ok(true)
        }

        async fn login(&self, _options: &LoginOptions) -> Result<ProviderRedirect, ProviderError> {
            Ok(ProviderRedirect::Completed)
        }

        async fn register(&self) -> Result<ProviderRedirect, ProviderError> {
            Ok(ProviderRedirect::Visit("https://idp.test/register".to_string()))
        }

        async fn logout(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn update_token(&self, _min_validity_secs: i64) -> Result<bool, ProviderError> {
            Ok(false)
        }

        fn token(&self) -> Option<ProviderToken> {
            Some(ProviderToken {
                access_token: "token".to_string(),
                expires_at: Utc::now() + Duration::minutes(5),
                claims: TokenClaims {
                    preferred_username: Some("alice".to_string()),
                    ..Default::default()
                },
            })
        }

        fn account_url(&self) -> String {
            "https://idp.test/account".to_string()
        }
    }

    /// Results are injected directly, so nothing should reach the network.
    struct OfflineTransport;

    #[async_trait]
    impl Transport for OfflineTransport {
        async fn execute(&self, request: &AuthorizedRequest) -> Result<ApiResponse, ApiError> {
            Err(ApiError::ServerError(format!("offline: {}", request.descriptor.path)))
        }
    }

    async fn signed_in_app() -> App {
        let app = App::with_services(
            Config::default(),
            Arc::new(SignedInProvider),
            Arc::new(OfflineTransport),
        );
        assert_eq!(app.sessions.initialize().await, SessionStatus::Authenticated);
        app
    }

    fn book(id: i64, title: &str) -> Book {
        Book {
            id,
            title: title.to_string(),
            main_author: Author {
                id: 1,
                name: "Ursula K. Le Guin".to_string(),
                created_at: None,
                updated_at: None,
            },
            authors: Vec::new(),
            description: None,
            quantity: 1,
            category_id: 1,
            category: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_current_epoch_books_are_applied() {
        let mut app = signed_in_app().await;

        app.process_background_result(BackgroundResult::Books(
            app.epoch,
            Ok(vec![book(1, "The Dispossessed")]),
        ));

        assert_eq!(app.books.len(), 1);
        assert_eq!(app.books[0].title, "The Dispossessed");
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_results_from_previous_epoch_are_discarded() {
        let mut app = signed_in_app().await;
        let previous = app.epoch;
        app.epoch += 1;

        app.process_background_result(BackgroundResult::Books(
            previous,
            Ok(vec![book(1, "The Dispossessed")]),
        ));
        app.process_background_result(BackgroundResult::Borrows(
            previous,
            Err(ApiError::Refresh(RefreshError::NotAuthenticated)),
        ));

        assert!(app.books.is_empty());
        assert_eq!(app.state, AppState::Normal);
    }

    #[tokio::test]
    async fn test_results_after_logout_are_discarded() {
        let mut app = signed_in_app().await;
        app.logout().await;
        assert_eq!(app.sessions.status(), SessionStatus::Unauthenticated);

        // Even a result tagged with the current epoch needs a live session
        app.process_background_result(BackgroundResult::Books(
            app.epoch,
            Ok(vec![book(2, "A Wizard of Earthsea")]),
        ));

        assert!(app.books.is_empty());
        assert!(app.surface().is_public());
    }

    #[tokio::test]
    async fn test_refresh_failure_prompts_reauthentication() {
        let mut app = signed_in_app().await;
        app.books = vec![book(1, "The Dispossessed")];

        app.process_background_result(BackgroundResult::Books(
            app.epoch,
            Err(ApiError::Refresh(RefreshError::Rejected("refresh token expired".to_string()))),
        ));

        assert_eq!(app.state, AppState::ReauthRequired);
        assert_eq!(app.status_message.as_deref(), Some(REAUTH_MESSAGE));
        // The session itself is untouched until the user confirms
        assert_eq!(app.sessions.status(), SessionStatus::Authenticated);

        app.confirm_reauth().await;

        assert_eq!(app.sessions.status(), SessionStatus::Unauthenticated);
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.books.is_empty());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_rejected_credential_prompts_reauthentication() {
        let mut app = signed_in_app().await;

        app.process_background_result(BackgroundResult::Borrows(
            app.epoch,
            Err(ApiError::Unauthorized {
                status: 401,
                body: String::new(),
            }),
        ));

        assert_eq!(app.state, AppState::ReauthRequired);
    }

    #[tokio::test]
    async fn test_other_errors_only_set_status_message() {
        let mut app = signed_in_app().await;

        app.process_background_result(BackgroundResult::Books(
            app.epoch,
            Err(ApiError::ServerError("boom".to_string())),
        ));

        assert_eq!(app.state, AppState::Normal);
        assert!(app
            .status_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Failed to load books")));
    }

    #[test]
    fn test_tab_next() {
        assert_eq!(Tab::Books.next(), Tab::Borrows);
        assert_eq!(Tab::Borrows.next(), Tab::Profile);
        assert_eq!(Tab::Profile.next(), Tab::Books); // Wraps around
    }

    #[test]
    fn test_tab_prev() {
        assert_eq!(Tab::Books.prev(), Tab::Profile); // Wraps around
        assert_eq!(Tab::Profile.prev(), Tab::Borrows);
        assert_eq!(Tab::Borrows.prev(), Tab::Books);
    }

    #[test]
    fn test_can_add_username_char() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(63, '@'));
        // Exceeds max length
        assert!(!can_add_username_char(64, 'a'));
        // Control characters rejected
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
        assert!(!can_add_username_char(0, '\t'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_login_error_messages() {
        assert_eq!(
            App::login_error_message(&ProviderError::Rejected("invalid_grant".to_string())),
            "Invalid username or password"
        );
        assert!(App::login_error_message(&ProviderError::Unreachable("dns".to_string()))
            .contains("Unable to reach"));
    }
}
