//! Keycloak implementation of the identity provider contract.
//!
//! `KeycloakClient` signs users in with the realm's token endpoint and keeps
//! the session alive with refresh-token grants. `TokenStore` persists the
//! refresh token so a restart can resume the session silently.

pub mod client;
pub mod token_store;

pub use client::{decode_claims, KeycloakClient, KeycloakConfig};
pub use token_store::{StoredTokens, TokenStore};
