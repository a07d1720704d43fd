//! The access decision engine: combines a member's tier, the caller's
//! classification, and the current policy into an allow/deny decision.
//!
//! # Decision Semantics
//!
//! Denial is data, not control flow: [`AccessDecisionEngine::decide`]
//! returns [`Decision::Deny`] as a normal value and reserves `Err` for
//! loader invariant violations (an unclassified member of a tracked class),
//! which are fatal.
//!
//! # Rule Ordering
//!
//! The precedence is fixed and security-relevant:
//!
//! 1. Disabled policy short-circuits everything, so privileged internal
//!    operations never pay tier-evaluation cost and never observe a partial
//!    check.
//! 2. `Sdk` is the overwhelmingly common case and exits next.
//! 3. Remaining tiers run from least to most restrictive, so the
//!    core-platform carve-out (the narrowest privilege) is evaluated last
//!    and cannot be widened by an earlier rule matching first.


use std::fmt;
use std::sync::Arc;

use crate::caller::CallerContext;
use crate::exemption::ExemptionList;
use crate::member::Member;
use crate::policy::PolicySnapshot;
use crate::tier::{ClassifyError, Tier, TierTable};

// =============================================================================
// Decision
// =============================================================================

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The access proceeds.
    Allow,
    /// The access is refused; the adapter translates the reason into the
    /// externally visible failure shape.
    Deny(DenyReason),
}

impl Decision {
    /// Whether this decision permits the access.
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Why an access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// An `Unsupported` member reached from outside the boot class path
    /// without a matching exemption.
    Unsupported,
    /// A `ConditionallyBlocked` member gated by the target-level comparison.
    ConditionallyBlocked,
    /// A `Blocklist` or `BlocklistCorePlatform` member.
    Blocklist,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported"),
            Self::ConditionallyBlocked => write!(f, "conditionally-blocked"),
            Self::Blocklist => write!(f, "blocklist"),
        }
    }
}

// =============================================================================
// ConditionalGate
// =============================================================================

/// Threshold comparison for `ConditionallyBlocked` members.
///
/// The exact composition of the policy value with a per-member target level
/// is deployment-specific, so the comparison is injectable rather than
/// hard-coded. Implementations must be cheap and non-blocking; they run on
/// the hot path.
pub trait ConditionalGate: Send + Sync {
    /// Whether the access is permitted for the given effective policy value
    /// and the member's gating level.
    fn permits(&self, policy_value: i32, max_target: u32) -> bool;
}

/// Default gate: allow while the effective policy value is below the
/// member's gating level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetLevelGate;

impl ConditionalGate for TargetLevelGate {
    fn permits(&self, policy_value: i32, max_target: u32) -> bool {
        i64::from(policy_value) < i64::from(max_target)
    }
}

// =============================================================================
// AccessDecisionEngine
// =============================================================================

/// Pure decision function over shared read-mostly state.
///
/// Holds the tier table and exemption list; the caller context and policy
/// snapshot are passed per access so a decision is a function of its inputs.
pub struct AccessDecisionEngine {
    tiers: Arc<TierTable>,
    exemptions: Arc<ExemptionList>,
    gate: Arc<dyn ConditionalGate>,
}

impl fmt::Debug for AccessDecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessDecisionEngine").finish_non_exhaustive()
    }
}

impl AccessDecisionEngine {
    /// Create an engine with the default [`TargetLevelGate`].
    #[must_use]
    pub fn new(tiers: Arc<TierTable>, exemptions: Arc<ExemptionList>) -> Self {
        Self::with_gate(tiers, exemptions, Arc::new(TargetLevelGate))
    }

    /// Create an engine with an injected conditional gate.
    #[must_use]
    pub fn with_gate(
        tiers: Arc<TierTable>,
        exemptions: Arc<ExemptionList>,
        gate: Arc<dyn ConditionalGate>,
    ) -> Self {
        Self {
            tiers,
            exemptions,
            gate,
        }
    }

    /// The shared tier table.
    #[must_use]
    pub fn tier_table(&self) -> &Arc<TierTable> {
        &self.tiers
    }

    /// The shared exemption list.
    #[must_use]
    pub fn exemptions(&self) -> &Arc<ExemptionList> {
        &self.exemptions
    }

    /// Decide whether `member` may be accessed by `caller` under `policy`.
    ///
    /// Members of untracked (application) classes are unrestricted.
    ///
    /// # Errors
    ///
    /// [`ClassifyError::UnclassifiedMember`] for a tracked class missing the
    /// member; a loader invariant violation callers treat as fatal.
    pub fn decide(
        &self,
        member: &Member,
        caller: CallerContext,
        policy: PolicySnapshot,
    ) -> Result<Decision, ClassifyError> {
        // Global kill switch: no tier lookup, no partial check.
        if !policy.enabled {
            return Ok(Decision::Allow);
        }
        let Some(tier) = self.tiers.classify(member)? else {
            return Ok(Decision::Allow);
        };
        let decision = match tier {
            Tier::Sdk => Decision::Allow,
            Tier::Unsupported => {
                if caller.boot || self.exemptions.is_exempt(&member.signature()) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::Unsupported)
                }
            },
            Tier::ConditionallyBlocked { max_target } => {
                if self.gate.permits(policy.value, max_target) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::ConditionallyBlocked)
                }
            },
            Tier::Blocklist => Decision::Deny(DenyReason::Blocklist),
            Tier::BlocklistCorePlatform => {
                if caller.core_platform {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::Blocklist)
                }
            },
        };
        Ok(decision)
    }
}
