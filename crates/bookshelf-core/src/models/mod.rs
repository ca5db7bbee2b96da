//! Data models for catalog entities.
//!
//! - `Book`, `Author`, `Category`: Catalog entries and their payloads
//! - `Borrow`, `BorrowStatus`: Personal borrowing records
//! - `User`, `Role`: Accounts as managed by administrators
//! - `Page`, `Listing`: Paginated and plain list responses

pub mod book;
pub mod borrow;
pub mod timestamp;
pub mod user;

use serde::Deserialize;

pub use book::{Author, AuthorInput, Book, BookCreate, BookUpdate, Category, CategoryInput};
pub use borrow::{Borrow, BorrowStatus};
pub use user::{Role, User, UserCreate, UserUpdate};

/// A page of results as returned by paginated endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub pages: Option<u64>,
}

/// List endpoints answer either with a page or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Paged(Page<T>),
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Paged(page) => page.items,
            Listing::Plain(items) => items,
        }
    }
}
