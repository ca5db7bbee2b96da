use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::book::Book;
use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowing,
    Returned,
    Overdue,
}

impl BorrowStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowing => "Borrowing",
            BorrowStatus::Returned => "Returned",
            BorrowStatus::Overdue => "Overdue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Borrow {
    pub id: i64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub borrow_date: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub book: Book,
}

impl Borrow {
    /// Still out and past its due date
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        self.return_date.is_none() && now > self.due_date
    }

    /// Days until due (negative when late)
    pub fn days_until_due(&self, now: DateTime<Utc>) -> i64 {
        (self.due_date - now).num_days()
    }
}
