//! Reader identity and reading-progress repository.
//!
//! # Responsibility
//! - Persist the user stand-in rows referenced by loans and profiles.
//! - Own the profile upsert and the mark-as-read credit transaction.
//!
//! # Invariants
//! - At most one profile per user (`user_profiles.user_id` is UNIQUE).
//! - A credit releases the copy and adds its page count in one IMMEDIATE
//!   transaction; the release is conditional on the expected borrower, so a
//!   copy can be credited at most once per loan.
//! - Ranking is ordered by `total_pages_read DESC`, ties by profile id.

use super::{count_to_u64, ensure_connection_ready, unique_violation_as, RepoError, RepoResult};
use crate::model::loan::{BookInstanceId, LoanStatus};
use crate::model::reader::{User, UserId, UserProfile};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;

const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";

const PROFILE_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.user_id AS user_id,
    u.username AS username,
    p.total_pages_read AS total_pages_read
FROM user_profiles p
INNER JOIN users u ON u.id = p.user_id";

/// Outcome of one successful mark-as-read credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadCredit {
    pub instance_id: BookInstanceId,
    pub pages_credited: u32,
    /// Profile state after the credit.
    pub profile: UserProfile,
    /// Whether this credit created the profile.
    pub profile_created: bool,
}

/// Repository interface for readers and reading progress.
pub trait ReaderRepository {
    fn create_user(&self, username: &str) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>>;
    /// Returns the user's profile, creating an empty one when absent.
    ///
    /// Single-statement upsert: concurrent callers observe the same row.
    fn ensure_profile(&self, user_id: UserId) -> RepoResult<UserProfile>;
    fn list_profiles_by_pages_read(&self) -> RepoResult<Vec<UserProfile>>;
    /// Credits the pages of the copy `instance_id` to `user_id` and returns
    /// the copy to the shelf.
    ///
    /// Fails with `NotFound` when the copy does not exist or is not borrowed
    /// by `user_id`; nothing is written in that case.
    fn record_book_read(&self, user_id: UserId, instance_id: BookInstanceId)
        -> RepoResult<ReadCredit>;
}

/// SQLite-backed reader repository.
pub struct SqliteReaderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReaderRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ReaderRepository for SqliteReaderRepository<'_> {
    fn create_user(&self, username: &str) -> RepoResult<User> {
        User::validate_username(username)?;
        let username = username.trim();
        self.conn
            .execute("INSERT INTO users (username) VALUES (?1);", [username])
            .map_err(|err| unique_violation_as(err, "username", USERNAME_TAKEN_MESSAGE))?;
        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
        })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username FROM users WHERE id = ?1;",
                [id],
                |row| {
                    Ok(User {
                        id: row.get("id")?,
                        username: row.get("username")?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>> {
        load_profile(self.conn, user_id)
    }

    fn ensure_profile(&self, user_id: UserId) -> RepoResult<UserProfile> {
        upsert_profile(self.conn, user_id)?;
        load_profile(self.conn, user_id)?
            .ok_or_else(|| RepoError::not_found("user profile", user_id))
    }

    fn list_profiles_by_pages_read(&self) -> RepoResult<Vec<UserProfile>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROFILE_SELECT_SQL} ORDER BY p.total_pages_read DESC, p.id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut profiles = Vec::new();
        while let Some(row) = rows.next()? {
            profiles.push(parse_profile_row(row)?);
        }
        Ok(profiles)
    }

    fn record_book_read(
        &self,
        user_id: UserId,
        instance_id: BookInstanceId,
    ) -> RepoResult<ReadCredit> {
        let instance_key = instance_id.to_string();
        // IMMEDIATE takes the write lock up front, so the borrower check and
        // the release below see the same row state.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let pages: Option<i64> = tx
            .query_row(
                "SELECT COALESCE(b.pages, 0)
                 FROM book_instances bi
                 LEFT JOIN books b ON b.id = bi.book_id
                 WHERE bi.id = ?1
                   AND bi.borrower_id = ?2;",
                params![instance_key.as_str(), user_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(pages) = pages else {
            return Err(RepoError::not_found("book instance", instance_id));
        };
        let pages = u32::try_from(pages).map_err(|_| {
            RepoError::InvalidData(format!("invalid page count `{pages}` in books.pages"))
        })?;

        let released = tx.execute(
            "UPDATE book_instances
             SET
                status = ?3,
                borrower_id = NULL
             WHERE id = ?1
               AND borrower_id = ?2;",
            params![instance_key.as_str(), user_id, LoanStatus::Available.code()],
        )?;
        if released != 1 {
            return Err(RepoError::not_found("book instance", instance_id));
        }

        let profile_created = upsert_profile(&tx, user_id)?;
        tx.execute(
            "UPDATE user_profiles
             SET total_pages_read = total_pages_read + ?2
             WHERE user_id = ?1;",
            params![user_id, pages],
        )?;
        let profile = load_profile(&tx, user_id)?
            .ok_or_else(|| RepoError::not_found("user profile", user_id))?;
        tx.commit()?;

        Ok(ReadCredit {
            instance_id,
            pages_credited: pages,
            profile,
            profile_created,
        })
    }
}

/// Inserts an empty profile when missing; returns whether a row was created.
fn upsert_profile(conn: &Connection, user_id: UserId) -> RepoResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO user_profiles (user_id, total_pages_read)
         VALUES (?1, 0)
         ON CONFLICT (user_id) DO NOTHING;",
        [user_id],
    )?;
    Ok(inserted == 1)
}

fn load_profile(conn: &Connection, user_id: UserId) -> RepoResult<Option<UserProfile>> {
    let mut stmt = conn.prepare(&format!("{PROFILE_SELECT_SQL} WHERE p.user_id = ?1;"))?;
    let mut rows = stmt.query([user_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_profile_row(row)?));
    }
    Ok(None)
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<UserProfile> {
    let total: i64 = row.get("total_pages_read")?;
    Ok(UserProfile {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        username: row.get("username")?,
        total_pages_read: count_to_u64(total, "user_profiles.total_pages_read")?,
    })
}
