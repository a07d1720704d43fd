//! Caller classification: which domain a calling class belongs to and
//! whether it is a core-platform caller.
//!
//! A [`CallerContext`] is derived per access and discarded; domain
//! membership cannot change once a class is loaded, so the resolver adds no
//! caching beyond the registry's own snapshots.

use std::sync::Arc;

use crate::domain::{DomainError, DomainId, DomainRegistry};
use crate::member::ClassId;

/// Per-access classification of the calling class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    /// Domain the caller was loaded from.
    pub domain: DomainId,
    /// Whether that domain is part of the boot class path.
    pub boot: bool,
    /// Whether callers from that domain are core-platform callers.
    pub core_platform: bool,
}

/// Resolves calling classes to caller contexts via the domain registry.
#[derive(Debug, Clone)]
pub struct CallerResolver {
    registry: Arc<DomainRegistry>,
}

impl CallerResolver {
    /// Create a resolver over the given registry.
    #[must_use]
    pub fn new(registry: Arc<DomainRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    /// Classify a calling class.
    ///
    /// # Errors
    ///
    /// [`DomainError::UnregisteredArtifact`] when the caller's defining
    /// artifact belongs to no registered domain; a loader invariant
    /// violation treated as fatal by callers.
    pub fn resolve(&self, calling_class: &ClassId) -> Result<CallerContext, DomainError> {
        let domain = self.registry.domain_of(calling_class)?;
        Ok(CallerContext {
            domain,
            boot: self.registry.is_boot(domain)?,
            core_platform: self.registry.is_core_platform(domain)?,
        })
    }
}
