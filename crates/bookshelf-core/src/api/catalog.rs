//! Typed catalog endpoints.
//!
//! Every call is a [`RequestDescriptor`] handed to the shared
//! [`RequestAuthorizer`]; nothing here knows about tokens.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    Author, AuthorInput, Book, BookCreate, BookUpdate, Borrow, Category, CategoryInput, Listing,
    User, UserCreate, UserUpdate,
};

use super::authorizer::{RequestAuthorizer, RequestDescriptor};
use super::ApiError;

/// Filters accepted by the book listing
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub title: String,
    pub author: String,
    pub category: String,
}

impl BookQuery {
    pub fn title(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

/// Current loans and past loans of the signed-in user
#[derive(Debug, Clone, Default)]
pub struct BorrowOverview {
    pub current: Vec<Borrow>,
    pub history: Vec<Borrow>,
}

#[derive(Clone)]
pub struct CatalogClient {
    authorizer: Arc<RequestAuthorizer>,
}

impl CatalogClient {
    pub fn new(authorizer: Arc<RequestAuthorizer>) -> Self {
        Self { authorizer }
    }

    async fn list<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<Vec<T>, ApiError> {
        let listing: Listing<T> = self.authorizer.send_json(descriptor).await?;
        Ok(listing.into_items())
    }

    async fn create<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.authorizer.send_json(RequestDescriptor::post(path, body)?).await
    }

    async fn update<T: DeserializeOwned, B: Serialize>(&self, path: String, body: &B) -> Result<T, ApiError> {
        self.authorizer.send_json(RequestDescriptor::put(path, body)?).await
    }

    async fn remove(&self, path: String) -> Result<(), ApiError> {
        self.authorizer.send(RequestDescriptor::delete(path)).await?;
        Ok(())
    }

    // ===== Session check =====

    /// Call the server's protected probe endpoint
    pub async fn fetch_protected(&self) -> Result<serde_json::Value, ApiError> {
        self.authorizer.send_json(RequestDescriptor::get("/protected")).await
    }

    // ===== Categories =====

    pub async fn fetch_categories(&self, search: &str) -> Result<Vec<Category>, ApiError> {
        self.list(RequestDescriptor::get("/user/categories").with_query("search", search))
            .await
    }

    pub async fn fetch_categories_admin(&self, search: &str) -> Result<Vec<Category>, ApiError> {
        self.list(RequestDescriptor::get("/admin/categories").with_query("search", search))
            .await
    }

    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, ApiError> {
        self.create("/admin/categories", input).await
    }

    pub async fn update_category(&self, id: i64, input: &CategoryInput) -> Result<Category, ApiError> {
        self.update(format!("/admin/categories/{}", id), input).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        self.remove(format!("/admin/categories/{}", id)).await
    }

    // ===== Books =====

    pub async fn fetch_books(&self, query: &BookQuery) -> Result<Vec<Book>, ApiError> {
        self.list(
            RequestDescriptor::get("/user/books")
                .with_query("title", &query.title)
                .with_query("author", &query.author)
                .with_query("category", &query.category),
        )
        .await
    }

    pub async fn fetch_book(&self, id: i64) -> Result<Book, ApiError> {
        self.authorizer
            .send_json(RequestDescriptor::get(format!("/user/books/{}", id)))
            .await
    }

    pub async fn fetch_books_admin(&self, search: &str) -> Result<Vec<Book>, ApiError> {
        self.list(RequestDescriptor::get("/admin/books").with_query("search", search))
            .await
    }

    pub async fn create_book(&self, book: &BookCreate) -> Result<Book, ApiError> {
        self.create("/admin/books", book).await
    }

    pub async fn update_book(&self, id: i64, update: &BookUpdate) -> Result<Book, ApiError> {
        self.update(format!("/admin/books/{}", id), update).await
    }

    pub async fn delete_book(&self, id: i64) -> Result<(), ApiError> {
        self.remove(format!("/admin/books/{}", id)).await
    }

    // ===== Authors =====

    pub async fn fetch_authors(&self, search: &str) -> Result<Vec<Author>, ApiError> {
        self.list(RequestDescriptor::get("/user/authors").with_query("search", search))
            .await
    }

    pub async fn fetch_authors_admin(&self, search: &str) -> Result<Vec<Author>, ApiError> {
        self.list(RequestDescriptor::get("/admin/authors").with_query("search", search))
            .await
    }

    pub async fn create_author(&self, input: &AuthorInput) -> Result<Author, ApiError> {
        self.create("/admin/authors", input).await
    }

    pub async fn update_author(&self, id: i64, input: &AuthorInput) -> Result<Author, ApiError> {
        self.update(format!("/admin/authors/{}", id), input).await
    }

    pub async fn delete_author(&self, id: i64) -> Result<(), ApiError> {
        self.remove(format!("/admin/authors/{}", id)).await
    }

    // ===== Users (admin) =====

    pub async fn fetch_users(&self, search: &str) -> Result<Vec<User>, ApiError> {
        self.list(RequestDescriptor::get("/admin/users").with_query("search", search))
            .await
    }

    pub async fn create_user(&self, user: &UserCreate) -> Result<User, ApiError> {
        self.create("/admin/users", user).await
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User, ApiError> {
        self.update(format!("/admin/users/{}", id), update).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        self.remove(format!("/admin/users/{}", id)).await
    }

    // ===== Borrows =====

    pub async fn fetch_current_borrows(&self) -> Result<Vec<Borrow>, ApiError> {
        self.list(RequestDescriptor::get("/user/borrows/current")).await
    }

    pub async fn fetch_borrow_history(&self) -> Result<Vec<Borrow>, ApiError> {
        self.list(RequestDescriptor::get("/user/borrows/history")).await
    }

    /// Fetch current loans and history concurrently
    pub async fn fetch_borrow_overview(&self) -> Result<BorrowOverview, ApiError> {
        let (current, history) =
            futures::try_join!(self.fetch_current_borrows(), self.fetch_borrow_history())?;
        Ok(BorrowOverview { current, history })
    }

    pub async fn borrow_book(&self, book_id: i64) -> Result<Borrow, ApiError> {
        self.authorizer
            .send_json(RequestDescriptor::new(
                reqwest::Method::POST,
                format!("/user/borrows/borrow/{}", book_id),
            ))
            .await
    }
}
