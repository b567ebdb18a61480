//! Command execution and the JSON response envelope.
//!
//! # Responsibility
//! - Open the catalog database and run one parsed command against the
//!   core services.
//! - Map every `ServiceError` to a stable status string.
//!
//! # Invariants
//! - Never panics; every failure becomes an envelope with `ok = false`.
//! - Capability checks happen here, once per command, before the service
//!   call that needs the grant.

use crate::config::CliConfig;
use crate::{AuthorFields, BookFields, Command};
use catalog_core::db::open_db;
use catalog_core::{
    AuthorDraft, BookDraft, BookInstance, Capability, CatalogAdminService, CatalogQueryService,
    DeleteOutcome, LoanService, NewBookInstance, PageRequest, RequestContext, ServiceError,
    ServiceResult, SqliteCatalogRepository, SqliteLoanRepository, SqliteReaderRepository,
};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

type Queries<'conn> = CatalogQueryService<
    SqliteCatalogRepository<'conn>,
    SqliteLoanRepository<'conn>,
    SqliteReaderRepository<'conn>,
>;
type Loans<'conn> = LoanService<SqliteLoanRepository<'conn>, SqliteReaderRepository<'conn>>;
type Admin<'conn> =
    CatalogAdminService<SqliteCatalogRepository<'conn>, SqliteReaderRepository<'conn>>;

/// Response envelope printed for every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    /// `ok`, `reprompt`, or the failure kind.
    pub status: &'static str,
    /// Human-readable message for the operator.
    pub message: String,
    /// Form field a validation failure belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, data: &impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                ok: true,
                status: "ok",
                message: message.into(),
                field: None,
                data: Some(value),
            },
            Err(err) => Self::failure("encode_error", format!("failed to encode result: {err}")),
        }
    }

    pub fn failure(status: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            message: message.into(),
            field: None,
            data: None,
        }
    }

    pub fn from_error(err: &ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => Self::failure("not_found", err.to_string()),
            ServiceError::PermissionDenied(_) => {
                Self::failure("permission_denied", err.to_string())
            }
            ServiceError::ValidationFailed(validation) => Self {
                field: Some(validation.field),
                ..Self::failure("validation_failed", validation.message.clone())
            },
            ServiceError::StorageConflict(_) => Self::failure("storage_conflict", err.to_string()),
            ServiceError::Storage(_) => Self::failure("storage_error", err.to_string()),
        }
    }

    fn deleted(entity: &str, outcome: DeleteOutcome) -> Self {
        match outcome {
            DeleteOutcome::Deleted => Self::success(format!("{entity} deleted."), &outcome),
            DeleteOutcome::Reprompt => Self {
                data: Some(Value::from("reprompt")),
                ..Self::failure(
                    "reprompt",
                    format!("{entity} was not deleted. Confirm again to retry."),
                )
            },
        }
    }
}

/// Copy row as shown in loan listings.
#[derive(Debug, Serialize)]
struct LoanView<'a> {
    #[serde(flatten)]
    copy: &'a BookInstance,
    overdue: bool,
}

/// Runs one command against the configured database.
pub fn execute(config: &CliConfig, command: Command, today: NaiveDate) -> ActionResponse {
    let conn = match open_db(&config.db_path) {
        Ok(conn) => conn,
        Err(err) => {
            warn!("event=cli_command module=cli status=error reason=db_open");
            return ActionResponse::failure(
                "storage_error",
                format!("catalog DB open failed: {err}"),
            );
        }
    };

    let response = match dispatch(&conn, &config.request_context(), command, today) {
        Ok(response) => response,
        Err(err) => ActionResponse::from_error(&err),
    };
    info!(
        "event=cli_command module=cli status={} user={:?}",
        response.status, config.user
    );
    response
}

fn dispatch(
    conn: &Connection,
    ctx: &RequestContext,
    command: Command,
    today: NaiveDate,
) -> ServiceResult<ActionResponse> {
    let response = match command {
        Command::Summary { q } => {
            let summary = queries(conn)?.catalog_summary(q.as_deref())?;
            ActionResponse::success("Catalog summary.", &summary)
        }
        Command::Search { term } => {
            let matches = queries(conn)?.search_books_by_title(&term)?;
            ActionResponse::success(format!("{matches} book(s) match."), &matches)
        }
        Command::Books { page, page_size } => {
            let books = queries(conn)?.list_books(&PageRequest { page, page_size })?;
            ActionResponse::success(
                format!("Page {} of {}.", books.page, books.num_pages()),
                &books,
            )
        }
        Command::Authors { page, page_size } => {
            let authors = queries(conn)?.list_authors(&PageRequest { page, page_size })?;
            ActionResponse::success(
                format!("Page {} of {}.", authors.page, authors.num_pages()),
                &authors,
            )
        }
        Command::Genres => ActionResponse::success("Genres.", &queries(conn)?.list_genres()?),
        Command::Languages => {
            ActionResponse::success("Languages.", &queries(conn)?.list_languages()?)
        }
        Command::Book { id } => {
            let detail = queries(conn)?.book_detail(id)?;
            ActionResponse::success(detail.book.title.clone(), &detail)
        }
        Command::Author { id } => {
            let detail = queries(conn)?.author_detail(id)?;
            ActionResponse::success(detail.author.display_name(), &detail)
        }
        Command::MyLoans => {
            let copies = queries(conn)?.list_borrowed_by_user(ctx)?;
            loan_listing(&copies, today)
        }
        Command::AllLoans => {
            let grant = ctx.authorize(Capability::CanMarkReturned)?;
            let copies = queries(conn)?.list_all_borrowed(&grant)?;
            loan_listing(&copies, today)
        }
        Command::Renew { instance, date } => {
            let grant = ctx.authorize(Capability::CanMarkReturned)?;
            let loans = loans(conn)?;
            let renewal_date = date.unwrap_or_else(|| loans.proposed_renewal_date(today));
            let copy = loans.renew(&grant, instance, renewal_date, today)?;
            ActionResponse::success(format!("Due back {renewal_date}."), &copy)
        }
        Command::MarkRead { instance } => {
            let credit = loans(conn)?.mark_as_read(ctx, instance)?;
            ActionResponse::success(
                format!("Marked as read. {} page(s) credited.", credit.pages_credited),
                &credit,
            )
        }
        Command::Rank => {
            let ranking = queries(conn)?.rank_users_by_pages_read()?;
            ActionResponse::success("Readers by pages read.", &ranking)
        }
        Command::RegisterUser { username } => {
            let user = admin(conn)?.register_user(&username)?;
            ActionResponse::success("User registered.", &user)
        }
        Command::AddGenre { name } => {
            let grant = ctx.authorize(Capability::AddGenre)?;
            let genre = admin(conn)?.create_genre(&grant, &name)?;
            ActionResponse::success("Genre created.", &genre)
        }
        Command::AddLanguage { name } => {
            let grant = ctx.authorize(Capability::AddLanguage)?;
            let language = admin(conn)?.create_language(&grant, &name)?;
            ActionResponse::success("Language created.", &language)
        }
        Command::AddAuthor { fields } => {
            let grant = ctx.authorize(Capability::AddAuthor)?;
            let author = admin(conn)?.create_author(&grant, &author_draft(fields))?;
            ActionResponse::success("Author created.", &author)
        }
        Command::UpdateAuthor { id, fields } => {
            let grant = ctx.authorize(Capability::ChangeAuthor)?;
            let author = admin(conn)?.update_author(&grant, id, &author_draft(fields))?;
            ActionResponse::success("Author updated.", &author)
        }
        Command::DeleteAuthor { id } => {
            let grant = ctx.authorize(Capability::DeleteAuthor)?;
            ActionResponse::deleted("Author", admin(conn)?.delete_author(&grant, id)?)
        }
        Command::AddBook { fields } => {
            let grant = ctx.authorize(Capability::AddBook)?;
            let book = admin(conn)?.create_book(&grant, &book_draft(fields))?;
            ActionResponse::success("Book created.", &book)
        }
        Command::UpdateBook { id, fields } => {
            let grant = ctx.authorize(Capability::ChangeBook)?;
            let book = admin(conn)?.update_book(&grant, id, &book_draft(fields))?;
            ActionResponse::success("Book updated.", &book)
        }
        Command::DeleteBook { id } => {
            let grant = ctx.authorize(Capability::DeleteBook)?;
            ActionResponse::deleted("Book", admin(conn)?.delete_book(&grant, id)?)
        }
        Command::AddCopy {
            book,
            imprint,
            status,
            due,
        } => {
            let grant = ctx.authorize(Capability::AddBookInstance)?;
            let copy = NewBookInstance {
                book_id: Some(book),
                imprint,
                status,
                due_back: due,
            };
            let created = loans(conn)?.create_instance(&grant, &copy)?;
            ActionResponse::success("Copy registered.", &created)
        }
        Command::Lend {
            instance,
            borrower,
            due,
        } => {
            let grant = ctx.authorize(Capability::CanMarkReturned)?;
            let copy = loans(conn)?.lend_instance(&grant, instance, borrower, due)?;
            ActionResponse::success(format!("On loan until {due}."), &copy)
        }
    };
    Ok(response)
}

fn loan_listing(copies: &[BookInstance], today: NaiveDate) -> ActionResponse {
    let rows = copies
        .iter()
        .map(|copy| LoanView {
            copy,
            overdue: copy.is_overdue(today),
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return ActionResponse::success("There are no books borrowed.", &rows);
    }
    ActionResponse::success(format!("{} copy(ies) on loan.", rows.len()), &rows)
}

fn author_draft(fields: AuthorFields) -> AuthorDraft {
    AuthorDraft {
        first_name: fields.first_name,
        last_name: fields.last_name,
        date_of_birth: fields.born,
        date_of_death: fields.died,
    }
}

fn book_draft(fields: BookFields) -> BookDraft {
    BookDraft {
        title: fields.title,
        author_id: fields.author,
        summary: fields.summary,
        isbn: fields.isbn,
        genre_ids: fields.genres,
        language_id: fields.language,
        pages: fields.pages,
    }
}

fn queries(conn: &Connection) -> ServiceResult<Queries<'_>> {
    Ok(CatalogQueryService::new(
        SqliteCatalogRepository::try_new(conn)?,
        SqliteLoanRepository::try_new(conn)?,
        SqliteReaderRepository::try_new(conn)?,
    ))
}

fn loans(conn: &Connection) -> ServiceResult<Loans<'_>> {
    Ok(LoanService::new(
        SqliteLoanRepository::try_new(conn)?,
        SqliteReaderRepository::try_new(conn)?,
    ))
}

fn admin(conn: &Connection) -> ServiceResult<Admin<'_>> {
    Ok(CatalogAdminService::new(
        SqliteCatalogRepository::try_new(conn)?,
        SqliteReaderRepository::try_new(conn)?,
    ))
}
