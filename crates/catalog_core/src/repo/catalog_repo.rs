//! Catalog metadata repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist genres, languages, authors and books.
//! - Own the `book_genres` link replacement with atomic semantics.
//! - Answer the catalog counts and the title search.
//!
//! # Invariants
//! - Book writes and their genre links commit in one transaction.
//! - Referenced author/language/genre ids must exist; otherwise the write is
//!   rejected as a field-level validation error.
//! - Language names are unique ignoring case, including non-ASCII letters.
//! - Book lists are ordered by `title, id`; author lists by
//!   `last_name, first_name, id`.

use super::{
    count_to_u64, ensure_connection_ready, unique_violation_as, Page, PageRequest, RepoError,
    RepoResult,
};
use crate::db::fold_case;
use crate::model::catalog::{
    Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, Genre, GenreId, Language, LanguageId,
};
use crate::model::ValidationError;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

pub const LANGUAGE_EXISTS_MESSAGE: &str = "Language already exists (case insensitive match)";
const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

const AUTHOR_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    date_of_birth,
    date_of_death
FROM authors";

const BOOK_SELECT_SQL: &str = "SELECT
    id,
    title,
    author_id,
    summary,
    isbn,
    language_id,
    pages
FROM books";

/// Repository interface for catalog metadata.
pub trait CatalogRepository {
    fn create_genre(&self, name: &str) -> RepoResult<Genre>;
    fn list_genres(&self) -> RepoResult<Vec<Genre>>;
    fn count_genres(&self) -> RepoResult<u64>;

    fn create_language(&self, name: &str) -> RepoResult<Language>;
    fn get_language(&self, id: LanguageId) -> RepoResult<Option<Language>>;
    fn list_languages(&self) -> RepoResult<Vec<Language>>;

    fn create_author(&self, draft: &AuthorDraft) -> RepoResult<Author>;
    fn update_author(&self, id: AuthorId, draft: &AuthorDraft) -> RepoResult<Author>;
    /// Deletes one author; their books keep existing with no author.
    fn delete_author(&self, id: AuthorId) -> RepoResult<()>;
    fn get_author(&self, id: AuthorId) -> RepoResult<Option<Author>>;
    fn list_authors(&self, page: &PageRequest) -> RepoResult<Page<Author>>;
    fn count_authors(&self) -> RepoResult<u64>;

    fn create_book(&self, draft: &BookDraft) -> RepoResult<Book>;
    /// Replaces book fields and the full genre set; `pages = None` keeps the stored count.
    fn update_book(&self, id: BookId, draft: &BookDraft) -> RepoResult<Book>;
    /// Deletes one book; its copies keep existing with no book.
    fn delete_book(&self, id: BookId) -> RepoResult<()>;
    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>>;
    fn list_books(&self, page: &PageRequest) -> RepoResult<Page<Book>>;
    fn list_books_by_author(&self, author_id: AuthorId) -> RepoResult<Vec<Book>>;
    /// Genres of one book ordered by name.
    fn list_genres_for_book(&self, id: BookId) -> RepoResult<Vec<Genre>>;
    fn count_books(&self) -> RepoResult<u64>;
    /// Counts books whose title contains `needle`, ignoring case.
    fn count_books_with_title_containing(&self, needle: &str) -> RepoResult<u64>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_genre(&self, name: &str) -> RepoResult<Genre> {
        Genre::validate_name(name)?;
        let name = name.trim();
        self.conn
            .execute("INSERT INTO genres (name) VALUES (?1);", [name])?;
        Ok(Genre {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn list_genres(&self) -> RepoResult<Vec<Genre>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM genres ORDER BY name ASC, id ASC;")?;
        let genres = stmt
            .query_map([], parse_genre_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(genres)
    }

    fn count_genres(&self) -> RepoResult<u64> {
        count(self.conn, "SELECT COUNT(*) FROM genres;", "genres")
    }

    fn create_language(&self, name: &str) -> RepoResult<Language> {
        Language::validate_name(name)?;
        let name = name.trim();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM languages WHERE fold_case(name) = ?1
            );",
            [fold_case(name)],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(ValidationError::new("name", LANGUAGE_EXISTS_MESSAGE).into());
        }
        tx.execute("INSERT INTO languages (name) VALUES (?1);", [name])
            .map_err(|err| unique_violation_as(err, "name", LANGUAGE_EXISTS_MESSAGE))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Language {
            id,
            name: name.to_string(),
        })
    }

    fn get_language(&self, id: LanguageId) -> RepoResult<Option<Language>> {
        let language = self
            .conn
            .query_row(
                "SELECT id, name FROM languages WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Language {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(language)
    }

    fn list_languages(&self) -> RepoResult<Vec<Language>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM languages ORDER BY name COLLATE NOCASE ASC, id ASC;")?;
        let languages = stmt
            .query_map([], |row| {
                Ok(Language {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(languages)
    }

    fn create_author(&self, draft: &AuthorDraft) -> RepoResult<Author> {
        draft.validate()?;
        self.conn.execute(
            "INSERT INTO authors (
                first_name,
                last_name,
                date_of_birth,
                date_of_death
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                draft.first_name.trim(),
                draft.last_name.trim(),
                draft.date_of_birth,
                draft.date_of_death,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_author(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("author {id} missing after insert")))
    }

    fn update_author(&self, id: AuthorId, draft: &AuthorDraft) -> RepoResult<Author> {
        draft.validate()?;
        let changed = self.conn.execute(
            "UPDATE authors
             SET
                first_name = ?2,
                last_name = ?3,
                date_of_birth = ?4,
                date_of_death = ?5
             WHERE id = ?1;",
            params![
                id,
                draft.first_name.trim(),
                draft.last_name.trim(),
                draft.date_of_birth,
                draft.date_of_death,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("author", id));
        }
        self.get_author(id)?
            .ok_or_else(|| RepoError::not_found("author", id))
    }

    fn delete_author(&self, id: AuthorId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM authors WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("author", id));
        }
        Ok(())
    }

    fn get_author(&self, id: AuthorId) -> RepoResult<Option<Author>> {
        let author = self
            .conn
            .query_row(
                &format!("{AUTHOR_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_author_row,
            )
            .optional()?;
        Ok(author)
    }

    fn list_authors(&self, page: &PageRequest) -> RepoResult<Page<Author>> {
        let total = self.count_authors()?;
        let mut stmt = self.conn.prepare(&format!(
            "{AUTHOR_SELECT_SQL}
             ORDER BY last_name ASC, first_name ASC, id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let items = stmt
            .query_map(params![page.limit(), page.offset()], parse_author_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            page: page.page(),
            page_size: page.limit(),
            total,
        })
    }

    fn count_authors(&self) -> RepoResult<u64> {
        count(self.conn, "SELECT COUNT(*) FROM authors;", "authors")
    }

    fn create_book(&self, draft: &BookDraft) -> RepoResult<Book> {
        draft.validate()?;
        let genre_ids = draft.normalized_genre_ids();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_references_exist(&tx, draft, &genre_ids)?;
        tx.execute(
            "INSERT INTO books (
                title,
                author_id,
                summary,
                isbn,
                language_id,
                pages
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.title.trim(),
                draft.author_id,
                draft.summary.as_str(),
                draft.isbn.trim(),
                draft.language_id,
                draft.pages.unwrap_or(0),
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_book_genres(&tx, id, &genre_ids)?;
        let book = load_book(&tx, id)?
            .ok_or_else(|| RepoError::InvalidData(format!("book {id} missing after insert")))?;
        tx.commit()?;

        Ok(book)
    }

    fn update_book(&self, id: BookId, draft: &BookDraft) -> RepoResult<Book> {
        draft.validate()?;
        let genre_ids = draft.normalized_genre_ids();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_references_exist(&tx, draft, &genre_ids)?;
        let changed = tx.execute(
            "UPDATE books
             SET
                title = ?2,
                author_id = ?3,
                summary = ?4,
                isbn = ?5,
                language_id = ?6,
                pages = COALESCE(?7, pages)
             WHERE id = ?1;",
            params![
                id,
                draft.title.trim(),
                draft.author_id,
                draft.summary.as_str(),
                draft.isbn.trim(),
                draft.language_id,
                draft.pages,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("book", id));
        }
        replace_book_genres(&tx, id, &genre_ids)?;
        let book = load_book(&tx, id)?.ok_or_else(|| RepoError::not_found("book", id))?;
        tx.commit()?;

        Ok(book)
    }

    fn delete_book(&self, id: BookId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM books WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("book", id));
        }
        Ok(())
    }

    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>> {
        load_book(self.conn, id)
    }

    fn list_books(&self, page: &PageRequest) -> RepoResult<Page<Book>> {
        let total = self.count_books()?;
        let mut stmt = self.conn.prepare(&format!(
            "{BOOK_SELECT_SQL}
             ORDER BY title ASC, id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![page.limit(), page.offset()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_book_row(self.conn, row)?);
        }
        Ok(Page {
            items,
            page: page.page(),
            page_size: page.limit(),
            total,
        })
    }

    fn list_books_by_author(&self, author_id: AuthorId) -> RepoResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BOOK_SELECT_SQL}
             WHERE author_id = ?1
             ORDER BY title ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([author_id])?;
        let mut books = Vec::new();
        while let Some(row) = rows.next()? {
            books.push(parse_book_row(self.conn, row)?);
        }
        Ok(books)
    }

    fn list_genres_for_book(&self, id: BookId) -> RepoResult<Vec<Genre>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.name
             FROM book_genres bg
             INNER JOIN genres g ON g.id = bg.genre_id
             WHERE bg.book_id = ?1
             ORDER BY g.name ASC, g.id ASC;",
        )?;
        let genres = stmt
            .query_map([id], parse_genre_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(genres)
    }

    fn count_books(&self) -> RepoResult<u64> {
        count(self.conn, "SELECT COUNT(*) FROM books;", "books")
    }

    fn count_books_with_title_containing(&self, needle: &str) -> RepoResult<u64> {
        let value: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM books WHERE instr(fold_case(title), ?1) > 0;",
            [fold_case(needle)],
            |row| row.get(0),
        )?;
        count_to_u64(value, "books")
    }
}

fn count(conn: &Connection, sql: &str, table: &str) -> RepoResult<u64> {
    let value: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    count_to_u64(value, table)
}

fn parse_genre_row(row: &Row<'_>) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

fn parse_author_row(row: &Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        date_of_birth: row.get("date_of_birth")?,
        date_of_death: row.get("date_of_death")?,
    })
}

fn parse_book_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Book> {
    let id: BookId = row.get("id")?;
    let pages: i64 = row.get("pages")?;
    let pages = u32::try_from(pages)
        .map_err(|_| RepoError::InvalidData(format!("invalid page count `{pages}` in books.pages")))?;

    Ok(Book {
        id,
        title: row.get("title")?,
        author_id: row.get("author_id")?,
        summary: row.get("summary")?,
        isbn: row.get("isbn")?,
        genre_ids: load_genre_ids(conn, id)?,
        language_id: row.get("language_id")?,
        pages,
    })
}

fn load_book(conn: &Connection, id: BookId) -> RepoResult<Option<Book>> {
    let mut stmt = conn.prepare(&format!("{BOOK_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_book_row(conn, row)?));
    }
    Ok(None)
}

fn load_genre_ids(conn: &Connection, book_id: BookId) -> RepoResult<Vec<GenreId>> {
    let mut stmt = conn.prepare(
        "SELECT genre_id FROM book_genres WHERE book_id = ?1 ORDER BY genre_id ASC;",
    )?;
    let ids = stmt
        .query_map([book_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn replace_book_genres(tx: &Transaction<'_>, book_id: BookId, genre_ids: &[GenreId]) -> RepoResult<()> {
    tx.execute("DELETE FROM book_genres WHERE book_id = ?1;", [book_id])?;
    for genre_id in genre_ids {
        tx.execute(
            "INSERT INTO book_genres (book_id, genre_id) VALUES (?1, ?2);",
            params![book_id, genre_id],
        )?;
    }
    Ok(())
}

fn ensure_references_exist(
    tx: &Transaction<'_>,
    draft: &BookDraft,
    genre_ids: &[GenreId],
) -> RepoResult<()> {
    if let Some(author_id) = draft.author_id {
        if !row_exists(tx, "SELECT EXISTS(SELECT 1 FROM authors WHERE id = ?1);", author_id)? {
            return Err(ValidationError::new("author", INVALID_CHOICE_MESSAGE).into());
        }
    }
    if let Some(language_id) = draft.language_id {
        if !row_exists(
            tx,
            "SELECT EXISTS(SELECT 1 FROM languages WHERE id = ?1);",
            language_id,
        )? {
            return Err(ValidationError::new("language", INVALID_CHOICE_MESSAGE).into());
        }
    }
    for genre_id in genre_ids {
        if !row_exists(tx, "SELECT EXISTS(SELECT 1 FROM genres WHERE id = ?1);", *genre_id)? {
            return Err(ValidationError::new("genre", INVALID_CHOICE_MESSAGE).into());
        }
    }
    Ok(())
}

fn row_exists(conn: &Connection, sql: &str, id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(exists == 1)
}
