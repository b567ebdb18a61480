//! Book instance (loanable copy) repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist physical copies and their loan state.
//! - Answer loan listings with a fixed ordering.
//!
//! # Invariants
//! - Loan listings are ordered by `due_back ASC` with `NULL` first, then by
//!   insertion order.
//! - Status values outside the four known codes are reported as invalid data.
//! - A lend never replaces an active loan; the on-loan guard lives in the
//!   UPDATE itself.

use super::{count_to_u64, ensure_connection_ready, RepoError, RepoResult};
use crate::model::catalog::BookId;
use crate::model::loan::{BookInstance, BookInstanceId, LoanStatus, NewBookInstance};
use crate::model::reader::UserId;
use crate::model::ValidationError;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const INSTANCE_SELECT_SQL: &str = "SELECT
    bi.id AS id,
    bi.book_id AS book_id,
    b.title AS book_title,
    bi.imprint AS imprint,
    bi.due_back AS due_back,
    bi.borrower_id AS borrower_id,
    bi.status AS status
FROM book_instances bi
LEFT JOIN books b ON b.id = bi.book_id";

/// Repository interface for book instance persistence.
pub trait LoanRepository {
    fn create_instance(&self, instance: &NewBookInstance) -> RepoResult<BookInstance>;
    fn get_instance(&self, id: BookInstanceId) -> RepoResult<Option<BookInstance>>;
    /// Puts one copy on loan to `borrower` until `due_back`.
    ///
    /// Fails with a `status` validation error when the copy is already on
    /// loan; the existing borrower is left in place.
    fn lend_instance(
        &self,
        id: BookInstanceId,
        borrower: UserId,
        due_back: NaiveDate,
    ) -> RepoResult<BookInstance>;
    /// Replaces the due date only; status and borrower are untouched.
    fn set_due_back(&self, id: BookInstanceId, due_back: NaiveDate) -> RepoResult<BookInstance>;
    fn count_instances(&self) -> RepoResult<u64>;
    fn count_instances_with_status(&self, status: LoanStatus) -> RepoResult<u64>;
    /// On-loan copies, optionally restricted to one borrower.
    fn list_on_loan(&self, borrower: Option<UserId>) -> RepoResult<Vec<BookInstance>>;
    fn list_instances_for_book(&self, book_id: BookId) -> RepoResult<Vec<BookInstance>>;
}

/// SQLite-backed book instance repository.
pub struct SqliteLoanRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLoanRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LoanRepository for SqliteLoanRepository<'_> {
    fn create_instance(&self, instance: &NewBookInstance) -> RepoResult<BookInstance> {
        instance.validate()?;
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO book_instances (
                id,
                book_id,
                imprint,
                due_back,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                instance.book_id,
                instance.imprint.trim(),
                instance.due_back,
                instance.status.code(),
            ],
        )?;
        self.get_instance(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("book instance {id} missing after insert")))
    }

    fn get_instance(&self, id: BookInstanceId) -> RepoResult<Option<BookInstance>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INSTANCE_SELECT_SQL} WHERE bi.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_instance_row(row)?));
        }
        Ok(None)
    }

    fn lend_instance(
        &self,
        id: BookInstanceId,
        borrower: UserId,
        due_back: NaiveDate,
    ) -> RepoResult<BookInstance> {
        let instance_key = id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE book_instances
             SET
                status = ?2,
                borrower_id = ?3,
                due_back = ?4
             WHERE id = ?1
               AND status <> ?2;",
            params![instance_key.as_str(), LoanStatus::OnLoan.code(), borrower, due_back],
        )?;
        if changed == 0 {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM book_instances WHERE id = ?1;",
                    [instance_key.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Err(RepoError::not_found("book instance", id));
            }
            return Err(ValidationError::new("status", "Copy is already on loan").into());
        }

        let instance = self
            .get_instance(id)?
            .ok_or_else(|| RepoError::not_found("book instance", id))?;
        tx.commit()?;
        Ok(instance)
    }

    fn set_due_back(&self, id: BookInstanceId, due_back: NaiveDate) -> RepoResult<BookInstance> {
        let changed = self.conn.execute(
            "UPDATE book_instances SET due_back = ?2 WHERE id = ?1;",
            params![id.to_string(), due_back],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("book instance", id));
        }
        self.get_instance(id)?
            .ok_or_else(|| RepoError::not_found("book instance", id))
    }

    fn count_instances(&self) -> RepoResult<u64> {
        let value: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM book_instances;", [], |row| row.get(0))?;
        count_to_u64(value, "book_instances")
    }

    fn count_instances_with_status(&self, status: LoanStatus) -> RepoResult<u64> {
        let value: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM book_instances WHERE status = ?1;",
            [status.code()],
            |row| row.get(0),
        )?;
        count_to_u64(value, "book_instances")
    }

    fn list_on_loan(&self, borrower: Option<UserId>) -> RepoResult<Vec<BookInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INSTANCE_SELECT_SQL}
             WHERE bi.status = ?1
               AND (?2 IS NULL OR bi.borrower_id = ?2)
             ORDER BY bi.due_back ASC, bi.rowid ASC;"
        ))?;
        let rows = stmt.query(params![LoanStatus::OnLoan.code(), borrower])?;
        collect_instances(rows)
    }

    fn list_instances_for_book(&self, book_id: BookId) -> RepoResult<Vec<BookInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INSTANCE_SELECT_SQL}
             WHERE bi.book_id = ?1
             ORDER BY bi.due_back ASC, bi.rowid ASC;"
        ))?;
        let rows = stmt.query([book_id])?;
        collect_instances(rows)
    }
}

fn collect_instances(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<BookInstance>> {
    let mut instances = Vec::new();
    while let Some(row) = rows.next()? {
        instances.push(parse_instance_row(row)?);
    }
    Ok(instances)
}

fn parse_instance_row(row: &Row<'_>) -> RepoResult<BookInstance> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in book_instances.id"))
    })?;

    let status_text: String = row.get("status")?;
    let status = LoanStatus::from_code(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in book_instances.status"
        ))
    })?;

    Ok(BookInstance {
        id,
        book_id: row.get("book_id")?,
        book_title: row.get("book_title")?,
        imprint: row.get("imprint")?,
        due_back: row.get("due_back")?,
        borrower_id: row.get("borrower_id")?,
        status,
    })
}
