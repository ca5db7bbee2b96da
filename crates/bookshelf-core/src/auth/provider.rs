//! Client contract of the external identity provider.
//!
//! The session layer never speaks the provider's protocol itself. It calls
//! through [`IdentityProvider`], which the Keycloak client implements for
//! real use and test fakes implement for everything else.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::claims::TokenClaims;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed identity provider response: {0}")]
    Malformed(String),

    #[error("Rejected by identity provider: {0}")]
    Rejected(String),

    #[error("No active session")]
    NoSession,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

/// What the provider should do when initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnLoad {
    /// Detect an existing session without prompting the user
    #[default]
    CheckSso,
    /// Require an interactive login if no session exists
    LoginRequired,
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub on_load: OnLoad,
}

/// Credentials handed to the provider's interactive login entry point.
#[derive(Clone, Default)]
pub struct LoginOptions {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOptions")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Outcome of an interactive entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRedirect {
    /// The provider finished the flow; re-initialize to pick up the session
    Completed,
    /// The user has to continue at this URL
    Visit(String),
}

/// The provider's current access token with its parsed claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: TokenClaims,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Initialize the client. Returns whether an active session was found.
    async fn init(&self, options: &InitOptions) -> Result<bool, ProviderError>;

    async fn login(&self, options: &LoginOptions) -> Result<ProviderRedirect, ProviderError>;

    async fn register(&self) -> Result<ProviderRedirect, ProviderError>;

    async fn logout(&self) -> Result<(), ProviderError>;

    /// Refresh the access token if it expires within `min_validity_secs`.
    /// Returns whether a refresh actually happened.
    async fn update_token(&self, min_validity_secs: i64) -> Result<bool, ProviderError>;

    fn token(&self) -> Option<ProviderToken>;

    /// URL of the provider's self-service account page
    fn account_url(&self) -> String;
}
