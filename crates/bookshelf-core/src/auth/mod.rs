//! Authentication and session management.
//!
//! This module provides:
//! - `SessionManager`: Owns the session lifecycle against an identity provider
//! - `AccessGate`: Maps session status to the surface the shell may render
//! - `IdentityProvider`: The provider client contract the session layer consumes
//! - `CredentialStore`: Remembered login passwords via the OS keychain

pub mod claims;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod provider;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use claims::{TokenClaims, UserClaims};
pub use credentials::CredentialStore;
pub use error::{InitError, RefreshError};
pub use gate::{AccessGate, GateAction, Surface};
pub use provider::{
    IdentityProvider, InitOptions, LoginOptions, OnLoad, ProviderError, ProviderRedirect,
    ProviderToken,
};
pub use session::{
    Credential, Session, SessionManager, SessionStatus, DEFAULT_REFRESH_THRESHOLD_SECS,
};
