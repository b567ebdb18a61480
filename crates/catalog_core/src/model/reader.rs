//! Readers and their reading progress.

use super::validation::require_text;
use super::ValidationError;
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ProfileId = i64;

pub const USERNAME_MAX_CHARS: usize = 150;

/// Identity record owned by the authentication system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn validate_username(username: &str) -> Result<(), ValidationError> {
        require_text("username", username, USERNAME_MAX_CHARS)
    }
}

/// Per-user reading progress; at most one row per user.
///
/// `total_pages_read` only grows through mark-as-read credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub user_id: UserId,
    /// Joined from `users`.
    pub username: String,
    pub total_pages_read: u64,
}
