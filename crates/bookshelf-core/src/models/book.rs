use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub book_count: Option<i64>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub main_author: Author,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    pub category_id: i64,
    /// Category name
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }

    /// Main author followed by co-authors, without duplicates
    pub fn author_names(&self) -> String {
        let mut names = vec![self.main_author.name.as_str()];
        for author in &self.authors {
            if !names.contains(&author.name.as_str()) {
                names.push(&author.name);
            }
        }
        names.join(", ")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookCreate {
    pub title: String,
    pub main_author_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: i64,
    pub category_id: i64,
    pub book_authors: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_author_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_authors: Option<Vec<i64>>,
}

/// Create/update payload for authors
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Create/update payload for categories
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
