//! In-memory identity provider used by unit tests across the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::claims::TokenClaims;
use super::provider::{
    IdentityProvider, InitOptions, LoginOptions, ProviderError, ProviderRedirect, ProviderToken,
};

#[derive(Debug, Clone)]
pub(crate) enum InitBehavior {
    Active { username: Option<String>, expires_in_secs: i64 },
    NoSession,
    Fail,
    /// Never answers
    Pending,
}

#[derive(Debug, Clone)]
pub(crate) enum RefreshBehavior {
    Succeed { lifetime_secs: i64 },
    Reject,
}

pub(crate) struct FakeProvider {
    init: InitBehavior,
    refresh: RefreshBehavior,
    refresh_delay: StdDuration,
    token: Mutex<Option<ProviderToken>>,
    pub init_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(init: InitBehavior, refresh: RefreshBehavior) -> Self {
        Self {
            init,
            refresh,
            refresh_delay: StdDuration::from_millis(0),
            token: Mutex::new(None),
            init_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn active(username: &str, expires_in_secs: i64) -> Self {
        Self::new(
            InitBehavior::Active {
                username: Some(username.to_string()),
                expires_in_secs,
            },
            RefreshBehavior::Succeed { lifetime_secs: 300 },
        )
    }

    pub fn with_refresh(mut self, refresh: RefreshBehavior) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_refresh_delay(mut self, delay: StdDuration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn issue(&self, access_token: String, username: Option<String>, lifetime_secs: i64) {
        let token = ProviderToken {
            access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime_secs),
            claims: TokenClaims {
                preferred_username: username,
                ..Default::default()
            },
        };
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token);
        }
    }

    fn current_username(&self) -> Option<String> {
        self.token
            .lock()
            .ok()
            .and_then(|t| t.as_ref().and_then(|t| t.claims.preferred_username.clone()))
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn init(&self, _options: &InitOptions) -> Result<bool, ProviderError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match &self.init {
            InitBehavior::Active {
                username,
                expires_in_secs,
            } => {
                self.issue("initial-token".to_string(), username.clone(), *expires_in_secs);
                Ok(true)
            }
            InitBehavior::NoSession => Ok(false),
            InitBehavior::Fail => Err(ProviderError::Unreachable("connection refused".to_string())),
            InitBehavior::Pending => std::future::pending().await,
        }
    }

    async fn login(&self, _options: &LoginOptions) -> Result<ProviderRedirect, ProviderError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderRedirect::Completed)
    }

    async fn register(&self) -> Result<ProviderRedirect, ProviderError> {
        Ok(ProviderRedirect::Visit("https://idp.test/register".to_string()))
    }

    async fn logout(&self) -> Result<(), ProviderError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        Ok(())
    }

    async fn update_token(&self, _min_validity_secs: i64) -> Result<bool, ProviderError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        match self.refresh {
            RefreshBehavior::Succeed { lifetime_secs } => {
                let username = self.current_username();
                self.issue(format!("refreshed-{}", n), username, lifetime_secs);
                Ok(true)
            }
            RefreshBehavior::Reject => {
                Err(ProviderError::Rejected("refresh token expired".to_string()))
            }
        }
    }

    fn token(&self) -> Option<ProviderToken> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn account_url(&self) -> String {
        "https://idp.test/account".to_string()
    }
}
