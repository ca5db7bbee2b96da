//! Bookshelf core - session management and authorized access to the
//! library catalog API.
//!
//! The pieces compose top-down:
//!
//! - [`auth::SessionManager`] owns the session lifecycle against an
//!   [`auth::IdentityProvider`] (Keycloak in production, see [`keycloak`]).
//! - [`api::RequestAuthorizer`] attaches a fresh bearer token to every
//!   outbound request; [`api::CatalogClient`] builds typed endpoints on it.
//! - [`auth::AccessGate`] decides which surface a shell may render.

pub mod api;
pub mod auth;
pub mod config;
pub mod keycloak;
pub mod models;

pub use config::Config;
