//! Catalog domain model.
//!
//! # Responsibility
//! - Define the records persisted by the catalog: metadata (`Genre`,
//!   `Language`, `Author`, `Book`), loanable copies (`BookInstance`) and
//!   reader progress (`User`, `UserProfile`).
//! - Validate form-level input before it reaches storage.
//!
//! # Invariants
//! - Catalog rows are identified by integer ids; instances by UUID.
//! - Deleting an author or language never deletes books.

pub mod catalog;
pub mod loan;
pub mod reader;
mod validation;

pub use validation::ValidationError;
