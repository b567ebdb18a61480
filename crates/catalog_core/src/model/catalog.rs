//! Catalog metadata records: genres, languages, authors and books.
//!
//! # Invariants
//! - `Genre.name` is never blank.
//! - `Language.name` is unique ignoring case.
//! - `Book.isbn` has at most 13 characters; `Book.pages` is non-negative by type.

use super::validation::{limit_text, require_text};
use super::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type GenreId = i64;
pub type LanguageId = i64;
pub type AuthorId = i64;
pub type BookId = i64;

pub const GENRE_NAME_MAX_CHARS: usize = 200;
pub const LANGUAGE_NAME_MAX_CHARS: usize = 200;
pub const AUTHOR_NAME_MAX_CHARS: usize = 100;
pub const BOOK_TITLE_MAX_CHARS: usize = 200;
pub const BOOK_SUMMARY_MAX_CHARS: usize = 1000;
pub const BOOK_ISBN_MAX_CHARS: usize = 13;

/// Number of genre names shown in compact book listings.
const DISPLAY_GENRE_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

impl Genre {
    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        require_text("name", name, GENRE_NAME_MAX_CHARS)
    }
}

/// Natural language a book is written in (e.g. English, French, Japanese).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub name: String,
}

impl Language {
    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        require_text("name", name, LANGUAGE_NAME_MAX_CHARS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl Author {
    /// Listing label in `last, first` form.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// Author form input used by both create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl AuthorDraft {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("first_name", &self.first_name, AUTHOR_NAME_MAX_CHARS)?;
        require_text("last_name", &self.last_name, AUTHOR_NAME_MAX_CHARS)?;
        Ok(())
    }
}

/// Catalog metadata for one title; physical copies live in `BookInstance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author_id: Option<AuthorId>,
    pub summary: String,
    pub isbn: String,
    /// Sorted ascending.
    pub genre_ids: Vec<GenreId>,
    pub language_id: Option<LanguageId>,
    pub pages: u32,
}

/// Book form input.
///
/// `pages = None` means "use the default" on create (0) and "keep the stored
/// value" on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDraft {
    pub title: String,
    pub author_id: Option<AuthorId>,
    pub summary: String,
    pub isbn: String,
    pub genre_ids: Vec<GenreId>,
    pub language_id: Option<LanguageId>,
    pub pages: Option<u32>,
}

impl BookDraft {
    pub fn new(title: impl Into<String>, isbn: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            isbn: isbn.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, BOOK_TITLE_MAX_CHARS)?;
        limit_text("summary", &self.summary, BOOK_SUMMARY_MAX_CHARS)?;
        require_text("isbn", &self.isbn, BOOK_ISBN_MAX_CHARS)?;
        Ok(())
    }

    /// Genre ids sorted and deduplicated, the shape stored in `book_genres`.
    pub fn normalized_genre_ids(&self) -> Vec<GenreId> {
        let mut ids = self.genre_ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Joins the first three genre names for compact book listings.
pub fn display_genre(genres: &[Genre]) -> String {
    genres
        .iter()
        .take(DISPLAY_GENRE_LIMIT)
        .map(|genre| genre.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
