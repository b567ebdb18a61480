//! Explicit capability checks for the presentation boundary.
//!
//! # Responsibility
//! - Carry the acting user and resolved permissions for one request.
//! - Turn a permission check into a `Grant` value that gated domain
//!   operations take as proof of authorization.
//!
//! # Invariants
//! - A `Grant` can only be produced by `RequestContext::authorize`.
//! - Domain services never look permissions up themselves; they only
//!   confirm a grant names the capability the operation needs.

mod capability;

pub use capability::{parse_capability, Capability, CapabilityParseError};

use crate::model::reader::UserId;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Caller does not hold the capability, or presented a grant for another one.
    CapabilityDenied { capability: Capability },
    /// Operation needs a signed-in user.
    AnonymousCaller,
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapabilityDenied { capability } => {
                write!(f, "capability denied: {capability}")
            }
            Self::AnonymousCaller => write!(f, "operation requires a signed-in user"),
        }
    }
}

impl Error for AccessError {}

/// Identity and resolved permissions of one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user: Option<UserId>,
    capabilities: BTreeSet<Capability>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: UserId) -> Self {
        Self {
            user: Some(user),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Returns the acting user or `AnonymousCaller`.
    pub fn require_user(&self) -> Result<UserId, AccessError> {
        self.user.ok_or(AccessError::AnonymousCaller)
    }

    /// Checks one capability and returns the proof gated operations require.
    ///
    /// Permissions are attached to signed-in users only; an anonymous
    /// context is always denied.
    pub fn authorize(&self, capability: Capability) -> Result<Grant, AccessError> {
        let user = self.require_user()?;
        if !self.has(capability) {
            return Err(AccessError::CapabilityDenied { capability });
        }
        Ok(Grant { capability, user })
    }
}

/// Proof that the boundary checked one capability for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    capability: Capability,
    user: UserId,
}

impl Grant {
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Confirms this grant was issued for `capability`.
    pub fn ensure(&self, capability: Capability) -> Result<(), AccessError> {
        if self.capability == capability {
            Ok(())
        } else {
            Err(AccessError::CapabilityDenied { capability })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessError, Capability, RequestContext};

    #[test]
    fn anonymous_context_is_never_authorized() {
        let ctx = RequestContext::anonymous().with_capability(Capability::AddBook);
        assert_eq!(
            ctx.authorize(Capability::AddBook),
            Err(AccessError::AnonymousCaller)
        );
    }

    #[test]
    fn authorize_requires_the_exact_capability() {
        let ctx = RequestContext::for_user(3).with_capability(Capability::AddBook);
        let grant = ctx.authorize(Capability::AddBook).unwrap();
        assert_eq!(grant.user(), 3);
        assert!(grant.ensure(Capability::AddBook).is_ok());
        assert_eq!(
            grant.ensure(Capability::DeleteBook),
            Err(AccessError::CapabilityDenied {
                capability: Capability::DeleteBook
            })
        );
        assert!(matches!(
            ctx.authorize(Capability::ChangeBook),
            Err(AccessError::CapabilityDenied { .. })
        ));
    }
}
