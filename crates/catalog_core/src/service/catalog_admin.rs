//! Administrative catalog mutations: create/update/delete for authors and
//! books, genre and language creation, and reader registration.
//!
//! # Invariants
//! - Every mutation except reader registration requires a grant for its
//!   named capability.
//! - A failed delete is never surfaced as an error: the caller gets
//!   `DeleteOutcome::Reprompt` and the cause is logged.
//! - A delete of a row that does not exist is `NotFound`, checked before
//!   the delete is attempted.

use super::{ServiceError, ServiceResult};
use crate::access::{Capability, Grant};
use crate::model::catalog::{Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, Genre, Language};
use crate::model::reader::User;
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::reader_repo::ReaderRepository;
use crate::repo::RepoResult;
use log::{info, warn};
use serde::Serialize;

/// Result of a delete confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Row removed; continue to the list page.
    Deleted,
    /// Delete failed; show the same confirmation again.
    Reprompt,
}

pub struct CatalogAdminService<C: CatalogRepository, R: ReaderRepository> {
    catalog: C,
    readers: R,
}

impl<C: CatalogRepository, R: ReaderRepository> CatalogAdminService<C, R> {
    pub fn new(catalog: C, readers: R) -> Self {
        Self { catalog, readers }
    }

    /// Creates the identity row loans and profiles refer to.
    pub fn register_user(&self, username: &str) -> ServiceResult<User> {
        let user = self.readers.create_user(username)?;
        info!("event=user_register module=admin status=ok user_id={}", user.id);
        Ok(user)
    }

    pub fn create_genre(&self, grant: &Grant, name: &str) -> ServiceResult<Genre> {
        grant.ensure(Capability::AddGenre)?;
        let genre = self.catalog.create_genre(name)?;
        info!("event=genre_create module=admin status=ok genre_id={}", genre.id);
        Ok(genre)
    }

    /// Creates a language; names differing only in case are rejected.
    pub fn create_language(&self, grant: &Grant, name: &str) -> ServiceResult<Language> {
        grant.ensure(Capability::AddLanguage)?;
        let language = self.catalog.create_language(name)?;
        info!(
            "event=language_create module=admin status=ok language_id={}",
            language.id
        );
        Ok(language)
    }

    pub fn create_author(&self, grant: &Grant, draft: &AuthorDraft) -> ServiceResult<Author> {
        grant.ensure(Capability::AddAuthor)?;
        let author = self.catalog.create_author(draft)?;
        info!("event=author_create module=admin status=ok author_id={}", author.id);
        Ok(author)
    }

    pub fn update_author(
        &self,
        grant: &Grant,
        id: AuthorId,
        draft: &AuthorDraft,
    ) -> ServiceResult<Author> {
        grant.ensure(Capability::ChangeAuthor)?;
        let author = self.catalog.update_author(id, draft)?;
        info!("event=author_update module=admin status=ok author_id={}", id);
        Ok(author)
    }

    /// Deletes one author; their books remain with no author.
    pub fn delete_author(&self, grant: &Grant, id: AuthorId) -> ServiceResult<DeleteOutcome> {
        grant.ensure(Capability::DeleteAuthor)?;
        if self.catalog.get_author(id)?.is_none() {
            return Err(ServiceError::NotFound {
                entity: "author",
                id: id.to_string(),
            });
        }
        Ok(swallow_delete_failure(
            "author_delete",
            id,
            self.catalog.delete_author(id),
        ))
    }

    pub fn create_book(&self, grant: &Grant, draft: &BookDraft) -> ServiceResult<Book> {
        grant.ensure(Capability::AddBook)?;
        let book = self.catalog.create_book(draft)?;
        info!(
            "event=book_create module=admin status=ok book_id={} genres={}",
            book.id,
            book.genre_ids.len()
        );
        Ok(book)
    }

    /// Updates one book; `draft.pages = None` keeps the stored page count.
    pub fn update_book(&self, grant: &Grant, id: BookId, draft: &BookDraft) -> ServiceResult<Book> {
        grant.ensure(Capability::ChangeBook)?;
        let book = self.catalog.update_book(id, draft)?;
        info!("event=book_update module=admin status=ok book_id={}", id);
        Ok(book)
    }

    /// Deletes one book; its copies remain with no book.
    pub fn delete_book(&self, grant: &Grant, id: BookId) -> ServiceResult<DeleteOutcome> {
        grant.ensure(Capability::DeleteBook)?;
        if self.catalog.get_book(id)?.is_none() {
            return Err(ServiceError::NotFound {
                entity: "book",
                id: id.to_string(),
            });
        }
        Ok(swallow_delete_failure(
            "book_delete",
            id,
            self.catalog.delete_book(id),
        ))
    }
}

fn swallow_delete_failure(event: &str, id: i64, result: RepoResult<()>) -> DeleteOutcome {
    match result {
        Ok(()) => {
            info!("event={event} module=admin status=ok id={id}");
            DeleteOutcome::Deleted
        }
        Err(err) => {
            warn!("event={event} module=admin status=reprompt id={id} error={err}");
            DeleteOutcome::Reprompt
        }
    }
}
