//! Catalog read use-cases: index counts, title search, listings, detail
//! pages, loan listings and the reading ranking.
//!
//! # Invariants
//! - A blank search term is not a filter: it yields the total book count.
//! - Loan listings keep the repository order (`due_back ASC`, `NULL` first).
//! - The all-loans listing requires a `can_mark_returned` grant.

use super::{ServiceError, ServiceResult};
use crate::access::{Capability, Grant, RequestContext};
use crate::model::catalog::{display_genre, Author, AuthorId, Book, BookId, Genre, Language};
use crate::model::loan::{BookInstance, LoanStatus};
use crate::model::reader::UserProfile;
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::loan_repo::LoanRepository;
use crate::repo::reader_repo::ReaderRepository;
use crate::repo::{Page, PageRequest};
use log::debug;
use serde::Serialize;

/// Index page payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    /// All books, or only title matches when a search term was given.
    pub num_books: u64,
    pub num_instances: u64,
    pub num_instances_available: u64,
    pub num_authors: u64,
    pub num_genres: u64,
    /// Trimmed search term echoed back; empty when none.
    pub search_term: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<Author>,
    pub language: Option<Language>,
    pub genres: Vec<Genre>,
    /// First three genre names joined with ", ".
    pub display_genre: String,
    pub instances: Vec<BookInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorDetail {
    pub author: Author,
    pub books: Vec<Book>,
}

pub struct CatalogQueryService<C: CatalogRepository, L: LoanRepository, R: ReaderRepository> {
    catalog: C,
    loans: L,
    readers: R,
}

impl<C: CatalogRepository, L: LoanRepository, R: ReaderRepository> CatalogQueryService<C, L, R> {
    pub fn new(catalog: C, loans: L, readers: R) -> Self {
        Self {
            catalog,
            loans,
            readers,
        }
    }

    pub fn count_books(&self) -> ServiceResult<u64> {
        Ok(self.catalog.count_books()?)
    }

    pub fn count_instances(&self) -> ServiceResult<u64> {
        Ok(self.loans.count_instances()?)
    }

    pub fn count_available_instances(&self) -> ServiceResult<u64> {
        Ok(self.loans.count_instances_with_status(LoanStatus::Available)?)
    }

    pub fn count_authors(&self) -> ServiceResult<u64> {
        Ok(self.catalog.count_authors()?)
    }

    pub fn count_genres(&self) -> ServiceResult<u64> {
        Ok(self.catalog.count_genres()?)
    }

    /// Counts books whose title contains `term`, ignoring case.
    ///
    /// A blank term returns the unfiltered total.
    pub fn search_books_by_title(&self, term: &str) -> ServiceResult<u64> {
        let needle = term.trim();
        if needle.is_empty() {
            return self.count_books();
        }
        let matches = self.catalog.count_books_with_title_containing(needle)?;
        debug!(
            "event=book_search module=catalog status=ok term_chars={} matches={}",
            needle.chars().count(),
            matches
        );
        Ok(matches)
    }

    pub fn catalog_summary(&self, search_term: Option<&str>) -> ServiceResult<CatalogSummary> {
        let search_term = search_term.map(str::trim).unwrap_or_default();
        Ok(CatalogSummary {
            num_books: self.search_books_by_title(search_term)?,
            num_instances: self.count_instances()?,
            num_instances_available: self.count_available_instances()?,
            num_authors: self.count_authors()?,
            num_genres: self.count_genres()?,
            search_term: search_term.to_string(),
        })
    }

    pub fn list_books(&self, page: &PageRequest) -> ServiceResult<Page<Book>> {
        Ok(self.catalog.list_books(page)?)
    }

    pub fn list_authors(&self, page: &PageRequest) -> ServiceResult<Page<Author>> {
        Ok(self.catalog.list_authors(page)?)
    }

    pub fn list_genres(&self) -> ServiceResult<Vec<Genre>> {
        Ok(self.catalog.list_genres()?)
    }

    pub fn list_languages(&self) -> ServiceResult<Vec<Language>> {
        Ok(self.catalog.list_languages()?)
    }

    pub fn book_detail(&self, id: BookId) -> ServiceResult<BookDetail> {
        let book = self.catalog.get_book(id)?.ok_or(ServiceError::NotFound {
            entity: "book",
            id: id.to_string(),
        })?;
        let author = match book.author_id {
            Some(author_id) => self.catalog.get_author(author_id)?,
            None => None,
        };
        let language = match book.language_id {
            Some(language_id) => self.catalog.get_language(language_id)?,
            None => None,
        };
        let genres = self.catalog.list_genres_for_book(id)?;
        let instances = self.loans.list_instances_for_book(id)?;

        Ok(BookDetail {
            display_genre: display_genre(&genres),
            book,
            author,
            language,
            genres,
            instances,
        })
    }

    pub fn author_detail(&self, id: AuthorId) -> ServiceResult<AuthorDetail> {
        let author = self.catalog.get_author(id)?.ok_or(ServiceError::NotFound {
            entity: "author",
            id: id.to_string(),
        })?;
        let books = self.catalog.list_books_by_author(id)?;
        Ok(AuthorDetail { author, books })
    }

    /// Copies the acting user currently has on loan, soonest due first.
    pub fn list_borrowed_by_user(&self, ctx: &RequestContext) -> ServiceResult<Vec<BookInstance>> {
        let user = ctx.require_user()?;
        Ok(self.loans.list_on_loan(Some(user))?)
    }

    /// Every copy on loan, soonest due first.
    pub fn list_all_borrowed(&self, grant: &Grant) -> ServiceResult<Vec<BookInstance>> {
        grant.ensure(Capability::CanMarkReturned)?;
        Ok(self.loans.list_on_loan(None)?)
    }

    /// Reading leaderboard, most pages first; ties keep profile creation order.
    pub fn rank_users_by_pages_read(&self) -> ServiceResult<Vec<UserProfile>> {
        Ok(self.readers.list_profiles_by_pages_read()?)
    }
}
