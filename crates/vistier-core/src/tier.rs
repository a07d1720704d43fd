//! Trust tier classification and the per-class tier table.
//!
//! Every member of a tracked class carries exactly one [`Tier`], assigned at
//! class-definition time and never mutated for the lifetime of that class
//! identity. The table is populated by the class-loading subsystem in one
//! batch per class and is read-only afterwards: readers clone an
//! `Arc<ClassFlags>` snapshot and perform O(1) hash lookups with no further
//! synchronization.
//!
//! # Fail-Closed Contract
//!
//! A tracked class whose flags are missing an accessed member indicates a
//! loader invariant violation, not a policy decision. [`TierTable::classify`]
//! surfaces it as [`ClassifyError::UnclassifiedMember`], which callers treat
//! as fatal.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::member::{ClassId, Member, MemberKey};

/// Maximum number of flagged members per class definition.
pub const MAX_MEMBERS_PER_CLASS: usize = 65_536;

// =============================================================================
// Tier
// =============================================================================

/// Trust classification of a class member.
///
/// Tiers are a strictly additional restriction layer over declared access
/// modifiers: they can forbid an access the modifier would allow, never
/// relax one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tier")]
pub enum Tier {
    /// Part of the supported surface; never restricted.
    Sdk,
    /// Discouraged. Gated by enforcement unless the caller is boot code or
    /// an exemption prefix matches.
    Unsupported,
    /// Gated by a per-member target level compared against the current
    /// policy value.
    ConditionallyBlocked {
        /// Accesses are permitted only while the effective policy value is
        /// below this level.
        max_target: u32,
    },
    /// Always denied while enforcement is on, regardless of caller domain.
    Blocklist,
    /// Denied unless the caller is a core-platform caller.
    BlocklistCorePlatform,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sdk => write!(f, "sdk"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::ConditionallyBlocked { max_target } => {
                write!(f, "conditionally-blocked(max-target {max_target})")
            },
            Self::Blocklist => write!(f, "blocklist"),
            Self::BlocklistCorePlatform => write!(f, "blocklist-core-platform"),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Tier table population or lookup failure.
///
/// All variants indicate loader/config bugs rather than policy outcomes and
/// are surfaced immediately instead of being silently tolerated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The same class identity was defined twice.
    #[error("class {class} from {artifact} already has tier flags")]
    DuplicateClass {
        /// Class descriptor.
        class: String,
        /// Defining artifact.
        artifact: String,
    },

    /// The same member was classified twice within one class definition.
    #[error("member {signature} classified twice")]
    DuplicateMember {
        /// Textual signature of the member.
        signature: String,
    },

    /// Too many members in one class definition.
    #[error("class {class} defines {count} flagged members (max {MAX_MEMBERS_PER_CLASS})")]
    TooManyMembers {
        /// Class descriptor.
        class: String,
        /// Observed member count.
        count: usize,
    },

    /// A tracked class is missing flags for an accessed member. Loader
    /// invariant violation; fatal.
    #[error("tracked class {class} has no tier for member {signature}")]
    UnclassifiedMember {
        /// Class descriptor.
        class: String,
        /// Textual signature of the member.
        signature: String,
    },
}

// =============================================================================
// ClassFlags
// =============================================================================

/// Immutable tier assignments for one class, keyed by member identity.
#[derive(Debug, Default)]
pub struct ClassFlags {
    tiers: HashMap<MemberKey, Tier>,
}

impl ClassFlags {
    /// Number of flagged members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Whether no members are flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Tier for a member key, if flagged.
    #[must_use]
    pub fn get(&self, key: &MemberKey) -> Option<Tier> {
        self.tiers.get(key).copied()
    }
}

/// Builder for one class's flags, used once at class-definition time.
#[derive(Debug, Default)]
pub struct ClassFlagsBuilder {
    tiers: HashMap<MemberKey, Tier>,
}

impl ClassFlagsBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tier for one member.
    ///
    /// # Errors
    ///
    /// [`ClassifyError::DuplicateMember`] if the member was already recorded.
    /// Recording the same key twice is rejected even with an identical tier:
    /// a loader that classifies twice is broken either way.
    pub fn member(&mut self, key: MemberKey, tier: Tier) -> Result<&mut Self, ClassifyError> {
        let signature = format!("{}:{}({})", key.name, key.descriptor, key.kind);
        if self.tiers.insert(key, tier).is_some() {
            return Err(ClassifyError::DuplicateMember { signature });
        }
        Ok(self)
    }

    /// Freeze the builder into immutable [`ClassFlags`].
    #[must_use]
    pub fn build(self) -> ClassFlags {
        ClassFlags { tiers: self.tiers }
    }
}

// =============================================================================
// TierTable
// =============================================================================

/// Runtime-wide mapping from member identity to trust tier.
///
/// Writes happen once per class (batch insert by the loader); the dominant
/// read path takes a brief shared lock to clone the per-class `Arc` and then
/// reads lock-free.
#[derive(Debug, Default)]
pub struct TierTable {
    classes: RwLock<HashMap<ClassId, Arc<ClassFlags>>>,
}

impl TierTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch-insert the flags for a newly defined class.
    ///
    /// # Errors
    ///
    /// [`ClassifyError::DuplicateClass`] if this class identity already has
    /// flags (a redefinition is a distinct identity, never a mutation), or
    /// [`ClassifyError::TooManyMembers`] if the definition exceeds
    /// [`MAX_MEMBERS_PER_CLASS`].
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn define_class(&self, class: ClassId, flags: ClassFlags) -> Result<(), ClassifyError> {
        if flags.len() > MAX_MEMBERS_PER_CLASS {
            return Err(ClassifyError::TooManyMembers {
                class: class.descriptor().to_string(),
                count: flags.len(),
            });
        }
        let mut classes = self.classes.write().expect("tier table lock poisoned");
        if classes.contains_key(&class) {
            return Err(ClassifyError::DuplicateClass {
                class: class.descriptor().to_string(),
                artifact: class.artifact().to_string(),
            });
        }
        tracing::debug!(
            class = %class,
            artifact = class.artifact(),
            members = flags.len(),
            "defined class tier flags"
        );
        classes.insert(class, Arc::new(flags));
        Ok(())
    }

    /// Snapshot of one class's flags, if the class is tracked.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn flags_of(&self, class: &ClassId) -> Option<Arc<ClassFlags>> {
        self.classes
            .read()
            .expect("tier table lock poisoned")
            .get(class)
            .cloned()
    }

    /// Tier of a member.
    ///
    /// Returns `Ok(None)` when the declaring class is untracked (application
    /// code carries no tier flags and is unrestricted).
    ///
    /// # Errors
    ///
    /// [`ClassifyError::UnclassifiedMember`] when the declaring class is
    /// tracked but carries no tier for this member. This indicates a corrupt
    /// table or a loader that skipped classification; callers treat it as
    /// fatal.
    pub fn classify(&self, member: &Member) -> Result<Option<Tier>, ClassifyError> {
        let Some(flags) = self.flags_of(member.declaring()) else {
            return Ok(None);
        };
        match flags.get(&member.key()) {
            Some(tier) => Ok(Some(tier)),
            None => Err(ClassifyError::UnclassifiedMember {
                class: member.declaring().descriptor().to_string(),
                signature: member.signature(),
            }),
        }
    }
}
