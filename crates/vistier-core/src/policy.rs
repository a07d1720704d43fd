//! Process-wide enforcement policy: an on/off switch and a threshold value,
//! mutable at runtime by privileged call sites.
//!
//! The pair `(enabled, value)` lives in a single atomically-swapped word, so
//! a reader racing a mutation observes either the fully-old or the fully-new
//! pair, never a torn mix. Mutations are rare (administrative and diagnostic
//! surfaces); reads happen on every member access.
//!
//! The disabled state is encoded by the sentinel [`POLICY_DISABLED`] value,
//! so `set_policy(old)` with the value returned by [`PolicyState::disable_policy`]
//! restores enforcement exactly. The invariant
//! `enabled == (value != POLICY_DISABLED)` holds for every reachable state,
//! which keeps nested privileged sections composable without consulting any
//! hidden global state.
//!
//! Set and disable push the prior pair on a save stack. The stack is
//! diagnostic state: restoration correctness never depends on it, because
//! call sites pass back the value they received. Popping past an empty stack
//! is a programming error and panics rather than being silently ignored.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Policy value meaning "no enforcement".
pub const POLICY_DISABLED: i32 = 0;

/// Default policy value at startup: enforce.
pub const POLICY_ENFORCE: i32 = 2;

/// Maximum save-stack depth. Deeper nesting indicates a leak of unmatched
/// set/disable calls.
pub const MAX_SAVED_POLICIES: usize = 1_024;

// =============================================================================
// Snapshot
// =============================================================================

/// A consistent view of the policy pair at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySnapshot {
    /// Whether enforcement is on.
    pub enabled: bool,
    /// Current policy value; doubles as the threshold input for
    /// conditionally blocked members.
    pub value: i32,
}

impl fmt::Display for PolicySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "enabled({})", self.value)
        } else {
            write!(f, "disabled")
        }
    }
}

// =============================================================================
// PolicyState
// =============================================================================

/// The mutable, process-wide enforcement policy.
#[derive(Debug)]
pub struct PolicyState {
    /// Packed `(enabled, value)` pair; bit 32 is the enabled flag, the low
    /// 32 bits are the value.
    word: AtomicU64,
    /// Prior pairs pushed by set/disable, newest last. Diagnostic only.
    saved: Mutex<Vec<PolicySnapshot>>,
}

impl Default for PolicyState {
    fn default() -> Self {
        Self::new(POLICY_ENFORCE)
    }
}

impl PolicyState {
    /// Create a policy with the given initial value. A value of
    /// [`POLICY_DISABLED`] starts with enforcement off.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self {
            word: AtomicU64::new(pack(value)),
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Current `(enabled, value)` pair, from one atomic load.
    #[must_use]
    pub fn snapshot(&self) -> PolicySnapshot {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// Current policy value.
    #[must_use]
    pub fn get_policy(&self) -> i32 {
        self.snapshot().value
    }

    /// Atomically swap the policy value, push the prior pair on the save
    /// stack, and return the prior value.
    ///
    /// Passing [`POLICY_DISABLED`] disables enforcement; any other value
    /// enables it. Call sites restore a previous state by passing back the
    /// value this method (or [`Self::disable_policy`]) returned.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_SAVED_POLICIES`] set/disable calls are
    /// unmatched, or if the save-stack lock is poisoned.
    pub fn set_policy(&self, value: i32) -> i32 {
        let prior = unpack(self.word.swap(pack(value), Ordering::AcqRel));
        self.push_saved(prior);
        tracing::info!(from = %prior, value, "policy value set");
        prior.value
    }

    /// Disable enforcement, push the prior pair, and return the prior value.
    ///
    /// Mirrors [`Self::set_policy`] so a disable can be undone with a single
    /// `set_policy(old)` call.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Self::set_policy`].
    pub fn disable_policy(&self) -> i32 {
        let prior = unpack(self.word.swap(pack(POLICY_DISABLED), Ordering::AcqRel));
        self.push_saved(prior);
        tracing::info!(from = %prior, "policy disabled");
        prior.value
    }

    /// Set the policy value without touching the save stack.
    ///
    /// Used by call sites undoing a prior set/disable with the value they
    /// received; the save stack is not consulted for correctness.
    pub fn restore_policy(&self, value: i32) {
        self.word.store(pack(value), Ordering::Release);
        tracing::info!(value, "policy restored");
    }

    /// Number of unmatched set/disable calls.
    ///
    /// # Panics
    ///
    /// Panics if the save-stack lock is poisoned.
    #[must_use]
    pub fn saved_depth(&self) -> usize {
        self.saved.lock().expect("policy save stack lock poisoned").len()
    }

    /// Pop the most recently saved pair.
    ///
    /// # Panics
    ///
    /// Panics on an empty stack: popping past the last save indicates an
    /// unbalanced restore and masking it would hide the loader bug.
    pub fn pop_saved(&self) -> PolicySnapshot {
        self.saved
            .lock()
            .expect("policy save stack lock poisoned")
            .pop()
            .expect("policy restore without matching set/disable")
    }

    fn push_saved(&self, prior: PolicySnapshot) {
        let mut saved = self.saved.lock().expect("policy save stack lock poisoned");
        assert!(
            saved.len() < MAX_SAVED_POLICIES,
            "policy save stack exceeded {MAX_SAVED_POLICIES} unmatched entries"
        );
        saved.push(prior);
    }
}

#[allow(clippy::cast_sign_loss)]
fn pack(value: i32) -> u64 {
    let enabled = u64::from(value != POLICY_DISABLED);
    (enabled << 32) | u64::from(value as u32)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn unpack(word: u64) -> PolicySnapshot {
    PolicySnapshot {
        enabled: (word >> 32) != 0,
        value: (word & 0xFFFF_FFFF) as u32 as i32,
    }
}

// =============================================================================
// Scoped disable
// =============================================================================

/// RAII guard that disables enforcement for a scope.
///
/// Construction disables the policy; drop pops the guard's save entry and
/// restores the prior value. Guards must be dropped in reverse construction
/// order (ordinary scoping does this naturally).
#[derive(Debug)]
pub struct ScopedPolicyDisable<'a> {
    policy: &'a PolicyState,
    prior: i32,
}

impl<'a> ScopedPolicyDisable<'a> {
    /// Disable enforcement until the guard is dropped.
    #[must_use]
    pub fn new(policy: &'a PolicyState) -> Self {
        let prior = policy.disable_policy();
        Self { policy, prior }
    }

    /// The policy value in effect before this guard.
    #[must_use]
    pub fn prior(&self) -> i32 {
        self.prior
    }
}

impl Drop for ScopedPolicyDisable<'_> {
    fn drop(&mut self) {
        self.policy.pop_saved();
        self.policy.restore_policy(self.prior);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_enforcing() {
        let policy = PolicyState::default();
        let snap = policy.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.value, POLICY_ENFORCE);
    }

    #[test]
    fn set_returns_prior_and_pushes() {
        let policy = PolicyState::new(2);
        assert_eq!(policy.set_policy(7), 2);
        assert_eq!(policy.get_policy(), 7);
        assert_eq!(policy.saved_depth(), 1);
        assert_eq!(policy.pop_saved(), PolicySnapshot { enabled: true, value: 2 });
    }

    #[test]
    fn disable_then_set_old_restores_enforcement() {
        let policy = PolicyState::new(2);
        let old = policy.disable_policy();
        assert!(!policy.snapshot().enabled);
        policy.set_policy(old);
        let snap = policy.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.value, 2);
    }

    #[test]
    fn round_trip_from_disabled_state() {
        let policy = PolicyState::new(POLICY_DISABLED);
        let old = policy.set_policy(9);
        assert_eq!(old, POLICY_DISABLED);
        policy.set_policy(old);
        assert_eq!(policy.snapshot(), PolicySnapshot { enabled: false, value: POLICY_DISABLED });
    }

    #[test]
    fn restore_does_not_pop() {
        let policy = PolicyState::new(2);
        let old = policy.set_policy(5);
        policy.restore_policy(old);
        assert_eq!(policy.saved_depth(), 1);
        assert_eq!(policy.get_policy(), 2);
    }

    #[test]
    fn negative_values_round_trip_through_packing() {
        let policy = PolicyState::new(-3);
        let snap = policy.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.value, -3);
    }

    #[test]
    fn scoped_disable_restores_on_drop() {
        let policy = PolicyState::new(4);
        {
            let guard = ScopedPolicyDisable::new(&policy);
            assert!(!policy.snapshot().enabled);
            assert_eq!(guard.prior(), 4);
        }
        let snap = policy.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.value, 4);
        assert_eq!(policy.saved_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "policy restore without matching set/disable")]
    fn pop_past_empty_stack_panics() {
        let policy = PolicyState::new(2);
        let _ = policy.pop_saved();
    }
}
