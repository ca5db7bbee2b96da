use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use super::claims::UserClaims;
use super::error::{InitError, RefreshError};
use super::provider::{
    IdentityProvider, InitOptions, LoginOptions, ProviderError, ProviderRedirect, ProviderToken,
};

/// Refresh the token when it expires within this many seconds.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
    InitFailed,
}

impl SessionStatus {
    /// Whether initialization has reached an outcome
    pub fn is_resolved(self) -> bool {
        !matches!(self, SessionStatus::Uninitialized | SessionStatus::Initializing)
    }

    pub fn is_authenticated(self) -> bool {
        self == SessionStatus::Authenticated
    }
}

/// Token, expiry and claims of an authenticated session. They only ever
/// exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: UserClaims,
}

impl Credential {
    fn from_provider(token: ProviderToken) -> Self {
        Self {
            claims: UserClaims::from_token(&token.claims),
            token: token.access_token,
            expires_at: token.expires_at,
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Check if the token expires in less than `threshold`
    pub fn expires_within(&self, threshold: Duration) -> bool {
        self.time_until_expiry() < threshold
    }
}

/// Authentication state of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Uninitialized,
    Initializing,
    Authenticated(Credential),
    Unauthenticated,
    InitFailed,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Uninitialized => SessionStatus::Uninitialized,
            Session::Initializing => SessionStatus::Initializing,
            Session::Authenticated(_) => SessionStatus::Authenticated,
            Session::Unauthenticated => SessionStatus::Unauthenticated,
            Session::InitFailed => SessionStatus::InitFailed,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Authenticated(credential) => Some(credential),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.credential().map(|c| c.token.as_str())
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.credential().map(|c| c.expires_at)
    }

    pub fn claims(&self) -> Option<&UserClaims> {
        self.credential().map(|c| &c.claims)
    }
}

/// Single owner of the session state.
///
/// Nothing outside this type writes the session; readers take snapshots via
/// [`SessionManager::snapshot`] or watch for changes via
/// [`SessionManager::subscribe`].
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<Session>,
    initialized: OnceCell<()>,
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(Session::Uninitialized);
        Self {
            provider,
            state,
            initialized: OnceCell::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    pub fn claims(&self) -> Option<UserClaims> {
        self.state.borrow().claims().cloned()
    }

    pub fn account_url(&self) -> String {
        self.provider.account_url()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check for an existing session with the identity provider.
    ///
    /// Only the first call talks to the provider; later and concurrent calls
    /// wait for that outcome and return the current status.
    pub async fn initialize(&self) -> SessionStatus {
        self.initialized
            .get_or_init(|| async {
                self.run_initialize().await;
            })
            .await;
        self.status()
    }

    async fn run_initialize(&self) {
        // A cancelled earlier attempt or a logout already settled the session
        if self.status().is_resolved() {
            return;
        }

        self.state.send_replace(Session::Initializing);
        let mut settle = SettleGuard::new(&self.state);

        let next = match self.check_session().await {
            Ok(Some(credential)) => {
                info!(username = %credential.claims.username, "Existing session found");
                Session::Authenticated(credential)
            }
            Ok(None) => {
                debug!("No active session");
                Session::Unauthenticated
            }
            Err(e) => {
                error!(error = %e, "Session initialization failed");
                Session::InitFailed
            }
        };

        settle.settle(next);
    }

    async fn check_session(&self) -> Result<Option<Credential>, InitError> {
        let authenticated = self.provider.init(&InitOptions::default()).await?;
        if !authenticated {
            return Ok(None);
        }

        let token = self.provider.token().ok_or(InitError::MissingToken)?;
        Ok(Some(Credential::from_provider(token)))
    }

    /// Hand off to the provider's interactive login. The session is not
    /// updated here; the shell re-initializes a fresh manager afterwards.
    pub async fn login(&self, options: &LoginOptions) -> Result<ProviderRedirect, ProviderError> {
        info!(username = %options.username, "Starting login");
        self.provider.login(options).await
    }

    /// Hand off to the provider's registration entry point.
    pub async fn register(&self) -> Result<ProviderRedirect, ProviderError> {
        info!("Starting registration");
        self.provider.register().await
    }

    /// End the session with the provider and clear local state.
    /// Always leaves the session `Unauthenticated`.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.logout().await {
            warn!(error = %e, "Provider logout failed, clearing local session anyway");
        }
        self.state.send_replace(Session::Unauthenticated);
        info!("Logged out");
    }

    /// Return a token valid for at least `threshold_secs`, refreshing it
    /// with the provider first if needed.
    ///
    /// Concurrent callers share one refresh: whoever gets the lock refreshes,
    /// the rest re-check expiry and reuse the result.
    pub async fn ensure_fresh_token(&self, threshold_secs: i64) -> Result<String, RefreshError> {
        let threshold = Duration::seconds(threshold_secs);

        match self.state.borrow().credential() {
            None => return Err(RefreshError::NotAuthenticated),
            Some(c) if !c.expires_within(threshold) => return Ok(c.token.clone()),
            Some(_) => {}
        }

        let _refreshing = self.refresh_lock.lock().await;

        let seconds_left = match self.state.borrow().credential() {
            None => return Err(RefreshError::NotAuthenticated),
            Some(c) if !c.expires_within(threshold) => return Ok(c.token.clone()),
            Some(c) => c.time_until_expiry().num_seconds(),
        };

        debug!(seconds_left, threshold_secs, "Access token near expiry, refreshing");

        if let Err(e) = self.provider.update_token(threshold_secs).await {
            warn!(error = %e, "Token refresh failed");
            return Err(RefreshError::Rejected(e.to_string()));
        }

        let refreshed = Credential::from_provider(self.provider.token().ok_or(RefreshError::MissingToken)?);
        let token = refreshed.token.clone();

        // A logout may have landed while the refresh was in flight
        let applied = self.state.send_if_modified(|session| match session {
            Session::Authenticated(current) => {
                *current = refreshed;
                true
            }
            _ => false,
        });

        if !applied {
            return Err(RefreshError::NotAuthenticated);
        }

        debug!("Access token refreshed");
        Ok(token)
    }
}

/// Publishes a terminal status when initialization ends, including when the
/// initializing future is dropped before completing.
struct SettleGuard<'a> {
    state: &'a watch::Sender<Session>,
    settled: bool,
}

impl<'a> SettleGuard<'a> {
    fn new(state: &'a watch::Sender<Session>) -> Self {
        Self {
            state,
            settled: false,
        }
    }

    /// Publish the outcome unless something else (a logout) already
    /// settled the session while the provider was being consulted.
    fn settle(&mut self, session: Session) {
        self.settled = true;
        if !publish_if_initializing(self.state, session) {
            debug!("Session settled elsewhere during initialization, discarding outcome");
        }
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && publish_if_initializing(self.state, Session::InitFailed) {
            warn!("Session initialization abandoned");
        }
    }
}

fn publish_if_initializing(state: &watch::Sender<Session>, next: Session) -> bool {
    state.send_if_modified(|session| {
        if !matches!(session, Session::Initializing) {
            return false;
        }
        *session = next;
        true
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::auth::testing::{FakeProvider, InitBehavior, RefreshBehavior};

    fn manager(provider: &Arc<FakeProvider>) -> SessionManager {
        SessionManager::new(provider.clone())
    }

    fn assert_fields_consistent(session: &Session) {
        let authenticated = session.status().is_authenticated();
        assert_eq!(session.token().is_some(), authenticated);
        assert_eq!(session.token_expiry().is_some(), authenticated);
        assert_eq!(session.claims().is_some(), authenticated);
    }

    #[tokio::test]
    async fn test_initialize_active_session() {
        let provider = Arc::new(FakeProvider::active("alice", 300));
        let sessions = manager(&provider);

        assert_eq!(sessions.status(), SessionStatus::Uninitialized);
        assert_eq!(sessions.initialize().await, SessionStatus::Authenticated);

        let snapshot = sessions.snapshot();
        assert_eq!(snapshot.claims().map(|c| c.username.as_str()), Some("alice"));
        assert_eq!(snapshot.token(), Some("initial-token"));
        assert_fields_consistent(&snapshot);
    }

    #[tokio::test]
    async fn test_initialize_defaults_missing_username() {
        let provider = Arc::new(FakeProvider::new(
            InitBehavior::Active {
                username: None,
                expires_in_secs: 300,
            },
            RefreshBehavior::Reject,
        ));
        let sessions = manager(&provider);

        sessions.initialize().await;
        assert_eq!(sessions.claims().map(|c| c.username), Some("User".to_string()));
    }

    #[tokio::test]
    async fn test_initialize_no_session() {
        let provider = Arc::new(FakeProvider::new(InitBehavior::NoSession, RefreshBehavior::Reject));
        let sessions = manager(&provider);

        assert_eq!(sessions.initialize().await, SessionStatus::Unauthenticated);
        assert_eq!(sessions.token(), None);
        assert_fields_consistent(&sessions.snapshot());
    }

    #[tokio::test]
    async fn test_initialize_provider_failure() {
        let provider = Arc::new(FakeProvider::new(InitBehavior::Fail, RefreshBehavior::Reject));
        let sessions = manager(&provider);

        assert_eq!(sessions.initialize().await, SessionStatus::InitFailed);
        assert_fields_consistent(&sessions.snapshot());
    }

    #[tokio::test]
    async fn test_initialize_only_contacts_provider_once() {
        let provider = Arc::new(FakeProvider::active("alice", 300));
        let sessions = manager(&provider);

        let (a, b) = tokio::join!(sessions.initialize(), sessions.initialize());
        assert_eq!(a, SessionStatus::Authenticated);
        assert_eq!(b, SessionStatus::Authenticated);
        assert_eq!(sessions.initialize().await, SessionStatus::Authenticated);

        assert_eq!(FakeProvider::count(&provider.init_calls), 1);
    }

    #[tokio::test]
    async fn test_initialize_after_logout_returns_current_status() {
        let provider = Arc::new(FakeProvider::active("alice", 300));
        let sessions = manager(&provider);

        sessions.initialize().await;
        sessions.logout().await;

        assert_eq!(sessions.initialize().await, SessionStatus::Unauthenticated);
        assert_eq!(FakeProvider::count(&provider.init_calls), 1);
    }

    #[tokio::test]
    async fn test_logout_during_initialize_wins() {
        let provider = Arc::new(FakeProvider::active("alice", 300));
        let sessions = manager(&provider);

        // The provider yields inside init, so logout lands while it is pending
        let (status, ()) = tokio::join!(sessions.initialize(), sessions.logout());

        assert_eq!(status, SessionStatus::Unauthenticated);
        let snapshot = sessions.snapshot();
        assert_eq!(snapshot.status(), SessionStatus::Unauthenticated);
        assert_eq!(snapshot.token(), None);
        assert_eq!(snapshot.claims(), None);
        assert_eq!(FakeProvider::count(&provider.init_calls), 1);
        assert_eq!(FakeProvider::count(&provider.logout_calls), 1);
    }

    #[tokio::test]
    async fn test_abandoned_initialize_settles_as_failed() {
        let provider = Arc::new(FakeProvider::new(InitBehavior::Pending, RefreshBehavior::Reject));
        let sessions = manager(&provider);

        let outcome = tokio::time::timeout(StdDuration::from_millis(20), sessions.initialize()).await;
        assert!(outcome.is_err(), "init should still be pending");
        assert_eq!(sessions.status(), SessionStatus::InitFailed);

        // Already settled; no second provider round-trip
        assert_eq!(sessions.initialize().await, SessionStatus::InitFailed);
        assert_eq!(FakeProvider::count(&provider.init_calls), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_session_from_any_state() {
        let provider = Arc::new(FakeProvider::active("alice", 300));

        let fresh = manager(&provider);
        fresh.logout().await;
        assert_eq!(fresh.status(), SessionStatus::Unauthenticated);
        // Logout settles the session; initialize has nothing left to do
        assert_eq!(fresh.initialize().await, SessionStatus::Unauthenticated);
        assert_eq!(FakeProvider::count(&provider.init_calls), 0);

        let signed_in = manager(&provider);
        signed_in.initialize().await;
        signed_in.logout().await;
        let snapshot = signed_in.snapshot();
        assert_eq!(snapshot.status(), SessionStatus::Unauthenticated);
        assert_eq!(snapshot.token(), None);
        assert_eq!(snapshot.claims(), None);
    }

    #[tokio::test]
    async fn test_login_does_not_change_status() {
        let provider = Arc::new(FakeProvider::new(InitBehavior::NoSession, RefreshBehavior::Reject));
        let sessions = manager(&provider);
        sessions.initialize().await;

        let options = LoginOptions {
            username: "alice".to_string(),
            password: "secret".to_string(),
        };
        let outcome = sessions.login(&options).await.expect("login should succeed");
        assert_eq!(outcome, ProviderRedirect::Completed);
        assert_eq!(sessions.status(), SessionStatus::Unauthenticated);
        assert_eq!(FakeProvider::count(&provider.login_calls), 1);
    }

    #[tokio::test]
    async fn test_register_returns_provider_redirect() {
        let provider = Arc::new(FakeProvider::new(InitBehavior::NoSession, RefreshBehavior::Reject));
        let sessions = manager(&provider);
        sessions.initialize().await;

        let outcome = sessions.register().await.expect("register should succeed");
        assert!(matches!(outcome, ProviderRedirect::Visit(_)));
        assert_eq!(sessions.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_fresh_token_not_refreshed() {
        let provider = Arc::new(FakeProvider::active("alice", 120));
        let sessions = manager(&provider);
        sessions.initialize().await;

        let token = sessions.ensure_fresh_token(30).await.expect("token should be fresh");
        assert_eq!(token, "initial-token");
        assert_eq!(FakeProvider::count(&provider.refresh_calls), 0);
    }

    #[tokio::test]
    async fn test_near_expiry_token_refreshed() {
        let provider = Arc::new(FakeProvider::active("alice", 10));
        let sessions = manager(&provider);
        sessions.initialize().await;
        let before = sessions.snapshot().token_expiry();

        let token = sessions.ensure_fresh_token(30).await.expect("refresh should succeed");
        assert_eq!(token, "refreshed-1");
        assert_eq!(FakeProvider::count(&provider.refresh_calls), 1);

        let snapshot = sessions.snapshot();
        assert_eq!(snapshot.token(), Some("refreshed-1"));
        assert!(snapshot.token_expiry() > before);
        assert_eq!(snapshot.claims().map(|c| c.username.as_str()), Some("alice"));

        // Now valid for five minutes; no further refresh
        sessions.ensure_fresh_token(30).await.expect("token should be fresh");
        assert_eq!(FakeProvider::count(&provider.refresh_calls), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_status() {
        let provider = Arc::new(FakeProvider::active("alice", 5).with_refresh(RefreshBehavior::Reject));
        let sessions = manager(&provider);
        sessions.initialize().await;

        let result = sessions.ensure_fresh_token(30).await;
        assert!(matches!(result, Err(RefreshError::Rejected(_))));
        assert_eq!(sessions.status(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_ensure_fresh_token_without_session() {
        let provider = Arc::new(FakeProvider::new(InitBehavior::NoSession, RefreshBehavior::Reject));
        let sessions = manager(&provider);
        sessions.initialize().await;

        assert_eq!(
            sessions.ensure_fresh_token(30).await,
            Err(RefreshError::NotAuthenticated)
        );
        assert_eq!(FakeProvider::count(&provider.refresh_calls), 0);
    }

    #[tokio::test]
    async fn test_logout_during_refresh_discards_new_token() {
        let provider = Arc::new(
            FakeProvider::active("alice", 10).with_refresh_delay(StdDuration::from_millis(50)),
        );
        let sessions = manager(&provider);
        sessions.initialize().await;

        let (result, ()) = tokio::join!(sessions.ensure_fresh_token(30), async {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            sessions.logout().await;
        });

        assert_eq!(result, Err(RefreshError::NotAuthenticated));
        assert_eq!(FakeProvider::count(&provider.refresh_calls), 1);
        let snapshot = sessions.snapshot();
        assert_eq!(snapshot.status(), SessionStatus::Unauthenticated);
        assert_eq!(snapshot.token(), None);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_single_flight() {
        let provider = Arc::new(
            FakeProvider::active("alice", 10).with_refresh_delay(StdDuration::from_millis(20)),
        );
        let sessions = Arc::new(manager(&provider));
        sessions.initialize().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sessions = sessions.clone();
            handles.push(tokio::spawn(async move { sessions.ensure_fresh_token(30).await }));
        }
        for handle in handles {
            let token = handle.await.expect("task should not panic").expect("refresh should succeed");
            assert_eq!(token, "refreshed-1");
        }

        assert_eq!(FakeProvider::count(&provider.refresh_calls), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let provider = Arc::new(FakeProvider::active("alice", 300));
        let sessions = manager(&provider);
        let mut rx = sessions.subscribe();

        sessions.initialize().await;
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().status(), SessionStatus::Authenticated);

        sessions.logout().await;
        assert_eq!(rx.borrow_and_update().status(), SessionStatus::Unauthenticated);
    }
}
