//! Core domain logic for the library catalog.
//! This crate is the single source of truth for catalog and loan invariants.

pub mod access;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::{parse_capability, AccessError, Capability, Grant, RequestContext};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::catalog::{
    display_genre, Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, Genre, GenreId,
    Language, LanguageId,
};
pub use model::loan::{BookInstance, BookInstanceId, LoanStatus, NewBookInstance};
pub use model::reader::{User, UserId, UserProfile};
pub use model::ValidationError;
pub use repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use repo::loan_repo::{LoanRepository, SqliteLoanRepository};
pub use repo::reader_repo::{ReadCredit, ReaderRepository, SqliteReaderRepository};
pub use repo::{Page, PageRequest, RepoError, RepoResult};
pub use service::catalog_admin::{CatalogAdminService, DeleteOutcome};
pub use service::catalog_query::{AuthorDetail, BookDetail, CatalogQueryService, CatalogSummary};
pub use service::loan_service::{LoanPolicy, LoanService};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
