//! Class-loading domains: the primordial boot domain, dynamically appended
//! boot segments, and the application domain.
//!
//! Domains form an append-only, strictly ordered sequence. Containment
//! matching walks boot entries in append order first and the application
//! domain last, so boot segments always take precedence. Appends are
//! copy-on-append: readers hold an `Arc` snapshot of the whole list and never
//! block; a writer clones the list, inserts the fully initialized entry, and
//! publishes the new vector in one swap. Two writers serialize on the write
//! lock.
//!
//! Once appended, a segment's `core_platform` flag is immutable. The
//! primordial boot domain is core-platform by definition: runtime code is
//! automatically approved.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::member::ClassId;

/// Maximum number of registered domains, segments included.
pub const MAX_DOMAINS: usize = 1_024;

/// Maximum number of artifacts in the primordial boot or app domain.
pub const MAX_ARTIFACTS_PER_DOMAIN: usize = 4_096;

// =============================================================================
// Identity and entries
// =============================================================================

/// Stable identifier of a registered domain.
///
/// Ids are assigned in registration order and never reused; they are opaque
/// to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainId(u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

/// Kind of class-loading domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// The primordial boot domain, created at startup.
    Boot,
    /// A boot segment appended while the runtime is live.
    BootSegment,
    /// The application domain, created once at startup.
    App,
}

impl DomainKind {
    /// Whether this domain participates in the boot class path.
    #[must_use]
    pub fn is_boot(self) -> bool {
        matches!(self, Self::Boot | Self::BootSegment)
    }
}

/// One registered domain: identity, kind, trust flag, and the artifacts it
/// contains.
#[derive(Debug, Clone)]
pub struct DomainEntry {
    id: DomainId,
    kind: DomainKind,
    core_platform: bool,
    artifacts: Vec<String>,
}

impl DomainEntry {
    /// Domain identifier.
    #[must_use]
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// Domain kind.
    #[must_use]
    pub fn kind(&self) -> DomainKind {
        self.kind
    }

    /// Whether callers from this domain are core-platform callers.
    #[must_use]
    pub fn is_core_platform(&self) -> bool {
        self.core_platform
    }

    /// Artifact paths contained in this domain.
    #[must_use]
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    fn contains(&self, artifact: &str) -> bool {
        self.artifacts.iter().any(|a| a == artifact)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Domain registration or classification failure.
///
/// Duplicate and unregistered-artifact failures indicate loader bugs that
/// would compromise the trust boundary; they are surfaced immediately rather
/// than tolerated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// The artifact is already registered under the boot parent.
    #[error("artifact {artifact:?} is already registered")]
    DuplicateDomain {
        /// Offending artifact path.
        artifact: String,
    },

    /// A class's defining artifact belongs to no registered domain.
    #[error("artifact {artifact:?} belongs to no registered domain")]
    UnregisteredArtifact {
        /// Offending artifact path.
        artifact: String,
    },

    /// An id that was never issued by this registry.
    #[error("unknown {0}")]
    UnknownDomain(DomainId),

    /// Registry capacity exceeded.
    #[error("domain registry is full ({MAX_DOMAINS} domains)")]
    RegistryFull,
}

// =============================================================================
// DomainRegistry
// =============================================================================

/// Versioned, append-only registry of class-loading domains.
#[derive(Debug)]
pub struct DomainRegistry {
    /// Ordered list: boot, segments in append order, app last. Readers clone
    /// the `Arc`; writers clone the vector and swap.
    entries: RwLock<Arc<Vec<DomainEntry>>>,
}

impl DomainRegistry {
    /// Create a registry with the primordial boot domain and the application
    /// domain. Boot artifacts are trusted core-platform code; app artifacts
    /// are untrusted.
    ///
    /// # Errors
    ///
    /// [`DomainError::DuplicateDomain`] if an artifact appears twice across
    /// the two lists, or [`DomainError::RegistryFull`] if a list exceeds
    /// [`MAX_ARTIFACTS_PER_DOMAIN`].
    pub fn new(
        boot_artifacts: Vec<String>,
        app_artifacts: Vec<String>,
    ) -> Result<Self, DomainError> {
        if boot_artifacts.len() > MAX_ARTIFACTS_PER_DOMAIN
            || app_artifacts.len() > MAX_ARTIFACTS_PER_DOMAIN
        {
            return Err(DomainError::RegistryFull);
        }
        for artifact in &app_artifacts {
            if boot_artifacts.iter().any(|b| b == artifact) {
                return Err(DomainError::DuplicateDomain {
                    artifact: artifact.clone(),
                });
            }
        }
        for (idx, artifact) in boot_artifacts.iter().enumerate() {
            if boot_artifacts[..idx].iter().any(|b| b == artifact) {
                return Err(DomainError::DuplicateDomain {
                    artifact: artifact.clone(),
                });
            }
        }
        for (idx, artifact) in app_artifacts.iter().enumerate() {
            if app_artifacts[..idx].iter().any(|b| b == artifact) {
                return Err(DomainError::DuplicateDomain {
                    artifact: artifact.clone(),
                });
            }
        }
        let entries = vec![
            DomainEntry {
                id: DomainId(0),
                kind: DomainKind::Boot,
                core_platform: true,
                artifacts: boot_artifacts,
            },
            DomainEntry {
                id: DomainId(1),
                kind: DomainKind::App,
                core_platform: false,
                artifacts: app_artifacts,
            },
        ];
        Ok(Self {
            entries: RwLock::new(Arc::new(entries)),
        })
    }

    /// Consistent snapshot of the ordered domain list.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<DomainEntry>> {
        Arc::clone(&self.entries.read().expect("domain registry lock poisoned"))
    }

    /// Append a boot segment containing a single artifact.
    ///
    /// The segment becomes visible to readers only after it is fully
    /// initialized, and matches ahead of the application domain.
    ///
    /// # Errors
    ///
    /// [`DomainError::DuplicateDomain`] if the artifact is already registered
    /// anywhere, or [`DomainError::RegistryFull`] at capacity.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn append_domain(
        &self,
        artifact: impl Into<String>,
        core_platform: bool,
    ) -> Result<DomainId, DomainError> {
        let artifact = artifact.into();
        let mut entries = self.entries.write().expect("domain registry lock poisoned");
        if entries.iter().any(|e| e.contains(&artifact)) {
            return Err(DomainError::DuplicateDomain { artifact });
        }
        if entries.len() >= MAX_DOMAINS {
            return Err(DomainError::RegistryFull);
        }
        let id = DomainId(u32::try_from(entries.len()).map_err(|_| DomainError::RegistryFull)?);
        let mut next: Vec<DomainEntry> = entries.as_ref().clone();
        let segment = DomainEntry {
            id,
            kind: DomainKind::BootSegment,
            core_platform,
            artifacts: vec![artifact.clone()],
        };
        // App stays last in match order; segments go in append order before it.
        let app_idx = next
            .iter()
            .position(|e| e.kind == DomainKind::App)
            .expect("app domain missing from registry");
        next.insert(app_idx, segment);
        *entries = Arc::new(next);
        tracing::debug!(%id, artifact = %artifact, core_platform, "appended boot segment");
        Ok(id)
    }

    /// Classify a class into a registered domain by walking the ordered list
    /// and testing artifact containment; the first match wins.
    ///
    /// # Errors
    ///
    /// [`DomainError::UnregisteredArtifact`] when the class's defining
    /// artifact belongs to no domain. This indicates a loader invariant
    /// violation and is treated as fatal by callers.
    pub fn domain_of(&self, class: &ClassId) -> Result<DomainId, DomainError> {
        let entries = self.snapshot();
        entries
            .iter()
            .find(|e| e.contains(class.artifact()))
            .map(DomainEntry::id)
            .ok_or_else(|| DomainError::UnregisteredArtifact {
                artifact: class.artifact().to_string(),
            })
    }

    /// Whether the given domain is marked core-platform.
    ///
    /// # Errors
    ///
    /// [`DomainError::UnknownDomain`] for an id this registry never issued.
    pub fn is_core_platform(&self, id: DomainId) -> Result<bool, DomainError> {
        self.entry(id).map(|e| e.core_platform)
    }

    /// Whether the given domain is part of the boot class path.
    ///
    /// # Errors
    ///
    /// [`DomainError::UnknownDomain`] for an id this registry never issued.
    pub fn is_boot(&self, id: DomainId) -> Result<bool, DomainError> {
        self.entry(id).map(|e| e.kind.is_boot())
    }

    fn entry(&self, id: DomainId) -> Result<DomainEntry, DomainError> {
        self.snapshot()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(DomainError::UnknownDomain(id))
    }
}
