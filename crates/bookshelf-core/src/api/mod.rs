//! REST API access for the library catalog.
//!
//! This module provides the `RequestAuthorizer`, the single place where
//! bearer credentials are attached to outbound requests, and the
//! `CatalogClient` with typed endpoints for books, authors, categories,
//! users and borrows.

pub mod authorizer;
pub mod catalog;
pub mod error;

pub use authorizer::{
    ApiResponse, AuthorizedRequest, HttpTransport, RequestAuthorizer, RequestDescriptor, Transport,
};
pub use catalog::{BookQuery, BorrowOverview, CatalogClient};
pub use error::ApiError;
