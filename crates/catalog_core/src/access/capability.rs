//! Named permissions a caller must hold before invoking catalog mutations.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Librarian permission: see all loans, renew and lend copies.
    CanMarkReturned,
    AddBook,
    ChangeBook,
    DeleteBook,
    AddAuthor,
    ChangeAuthor,
    DeleteAuthor,
    AddGenre,
    AddLanguage,
    AddBookInstance,
}

/// Permission string for loan management.
pub const CAPABILITY_CAN_MARK_RETURNED: &str = "can_mark_returned";
pub const CAPABILITY_ADD_BOOK: &str = "add_book";
pub const CAPABILITY_CHANGE_BOOK: &str = "change_book";
pub const CAPABILITY_DELETE_BOOK: &str = "delete_book";
pub const CAPABILITY_ADD_AUTHOR: &str = "add_author";
pub const CAPABILITY_CHANGE_AUTHOR: &str = "change_author";
pub const CAPABILITY_DELETE_AUTHOR: &str = "delete_author";
pub const CAPABILITY_ADD_GENRE: &str = "add_genre";
pub const CAPABILITY_ADD_LANGUAGE: &str = "add_language";
pub const CAPABILITY_ADD_BOOK_INSTANCE: &str = "add_bookinstance";

const ALL_CAPABILITIES: &[Capability] = &[
    Capability::CanMarkReturned,
    Capability::AddBook,
    Capability::ChangeBook,
    Capability::DeleteBook,
    Capability::AddAuthor,
    Capability::ChangeAuthor,
    Capability::DeleteAuthor,
    Capability::AddGenre,
    Capability::AddLanguage,
    Capability::AddBookInstance,
];

impl Capability {
    /// Stable permission codename.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanMarkReturned => CAPABILITY_CAN_MARK_RETURNED,
            Self::AddBook => CAPABILITY_ADD_BOOK,
            Self::ChangeBook => CAPABILITY_CHANGE_BOOK,
            Self::DeleteBook => CAPABILITY_DELETE_BOOK,
            Self::AddAuthor => CAPABILITY_ADD_AUTHOR,
            Self::ChangeAuthor => CAPABILITY_CHANGE_AUTHOR,
            Self::DeleteAuthor => CAPABILITY_DELETE_AUTHOR,
            Self::AddGenre => CAPABILITY_ADD_GENRE,
            Self::AddLanguage => CAPABILITY_ADD_LANGUAGE,
            Self::AddBookInstance => CAPABILITY_ADD_BOOK_INSTANCE,
        }
    }

    pub fn all() -> &'static [Capability] {
        ALL_CAPABILITIES
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one permission codename.
///
/// Accepts the bare codename (`add_book`) or the app-qualified form
/// (`catalog.add_book`).
pub fn parse_capability(value: &str) -> Result<Capability, CapabilityParseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(CapabilityParseError::Empty);
    }
    let codename = normalized.strip_prefix("catalog.").unwrap_or(normalized);

    ALL_CAPABILITIES
        .iter()
        .copied()
        .find(|capability| capability.as_str() == codename)
        .ok_or_else(|| CapabilityParseError::Unsupported(normalized.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityParseError {
    Empty,
    Unsupported(String),
}

impl Display for CapabilityParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "capability value must not be empty"),
            Self::Unsupported(value) => write!(f, "capability is unsupported: {value}"),
        }
    }
}

impl Error for CapabilityParseError {}
