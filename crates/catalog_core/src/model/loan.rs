//! Loanable copies of catalog books.
//!
//! # Invariants
//! - `status` is always one of the four `LoanStatus` values; new copies
//!   start in `Maintenance`.
//! - `book_title` is a read projection joined from `books`; it is never
//!   written through this record.

use super::catalog::BookId;
use super::reader::UserId;
use super::validation::require_text;
use super::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Library-wide unique id of one physical copy.
pub type BookInstanceId = Uuid;

pub const IMPRINT_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[default]
    Maintenance,
    OnLoan,
    Available,
    Reserved,
}

impl LoanStatus {
    /// Single-character code persisted in `book_instances.status`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Maintenance => "m",
            Self::OnLoan => "o",
            Self::Available => "a",
            Self::Reserved => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(Self::Maintenance),
            "o" => Some(Self::OnLoan),
            "a" => Some(Self::Available),
            "r" => Some(Self::Reserved),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Maintenance => "Maintenance",
            Self::OnLoan => "On loan",
            Self::Available => "Available",
            Self::Reserved => "Reserved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInstance {
    pub id: BookInstanceId,
    pub book_id: Option<BookId>,
    pub book_title: Option<String>,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<UserId>,
    pub status: LoanStatus,
}

impl BookInstance {
    /// A copy is overdue once its due date has passed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_back.is_some_and(|due| due < today)
    }

    /// `<id> (<book title>)`, with an empty title when the book is gone.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.id, self.book_title.as_deref().unwrap_or(""))
    }
}

/// Administrative input for registering a new physical copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookInstance {
    pub book_id: Option<BookId>,
    pub imprint: String,
    pub status: LoanStatus,
    pub due_back: Option<NaiveDate>,
}

impl NewBookInstance {
    pub fn new(book_id: BookId, imprint: impl Into<String>) -> Self {
        Self {
            book_id: Some(book_id),
            imprint: imprint.into(),
            status: LoanStatus::default(),
            due_back: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("imprint", &self.imprint, IMPRINT_MAX_CHARS)
    }
}
