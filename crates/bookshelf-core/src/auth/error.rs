use thiserror::Error;

use super::provider::ProviderError;

/// Startup failure while checking for an existing session.
/// Absorbed by the session manager into `SessionStatus::InitFailed`.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Identity provider initialization failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Identity provider reported a session but returned no token")]
    MissingToken,
}

/// Failure to keep the access token fresh. Callers must treat the request
/// as unauthenticated and abort it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No active session to refresh")]
    NotAuthenticated,

    #[error("Token refresh rejected: {0}")]
    Rejected(String),

    #[error("Identity provider returned no token after refresh")]
    MissingToken,
}
