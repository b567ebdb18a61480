//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the operations the presentation
//!   boundary invokes.
//! - Translate storage and access failures into the `ServiceError` taxonomy.
//!
//! # Invariants
//! - Gated operations take a `Grant` and confirm its capability; they never
//!   resolve permissions themselves.
//! - Busy/locked storage is retried at most once before surfacing
//!   `StorageConflict`.

use crate::access::AccessError;
use crate::model::ValidationError;
use crate::repo::{RepoError, RepoResult};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog_admin;
pub mod catalog_query;
pub mod loan_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure taxonomy handed back to the presentation boundary.
#[derive(Debug)]
pub enum ServiceError {
    /// Referenced row does not exist, or the caller does not own it.
    NotFound { entity: &'static str, id: String },
    /// Capability check failed or caller is anonymous.
    PermissionDenied(AccessError),
    /// Input outside declared constraints; carries the offending field.
    ValidationFailed(ValidationError),
    /// Concurrent mutation kept the database busy after one retry.
    StorageConflict(RepoError),
    /// Any other persistence failure.
    Storage(RepoError),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageConflict(_))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::PermissionDenied(err) => write!(f, "permission denied: {err}"),
            Self::ValidationFailed(err) => write!(f, "validation failed: {err}"),
            Self::StorageConflict(err) => write!(f, "storage conflict: {err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::PermissionDenied(err) => Some(err),
            Self::ValidationFailed(err) => Some(err),
            Self::StorageConflict(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::ValidationFailed(err),
            other if other.is_busy() => Self::StorageConflict(other),
            other => Self::Storage(other),
        }
    }
}

impl From<AccessError> for ServiceError {
    fn from(value: AccessError) -> Self {
        Self::PermissionDenied(value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::ValidationFailed(value)
    }
}

/// Runs `attempt`, retrying once when storage reports busy/locked.
fn retry_on_conflict<T>(
    operation: &'static str,
    mut attempt: impl FnMut() -> RepoResult<T>,
) -> ServiceResult<T> {
    match attempt() {
        Err(err) if err.is_busy() => {
            warn!("event={operation} module=service status=retry reason=storage_busy");
            attempt().map_err(ServiceError::from)
        }
        other => other.map_err(ServiceError::from),
    }
}
