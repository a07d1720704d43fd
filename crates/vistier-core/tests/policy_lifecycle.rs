//! Policy mutation lifecycle: idempotence, set/restore round-trips across a
//! member/caller grid, and the scoped disable guard.

use std::sync::Arc;

use vistier_core::caller::{CallerContext, CallerResolver};
use vistier_core::decision::{AccessDecisionEngine, Decision};
use vistier_core::domain::DomainRegistry;
use vistier_core::exemption::ExemptionList;
use vistier_core::member::{AccessModifier, ClassId, Member, MemberKey, MemberKind};
use vistier_core::policy::{PolicyState, ScopedPolicyDisable};
use vistier_core::tier::{ClassFlagsBuilder, Tier, TierTable};

struct Grid {
    engine: AccessDecisionEngine,
    members: Vec<Member>,
    callers: Vec<CallerContext>,
}

impl Grid {
    fn new() -> Self {
        let registry = Arc::new(
            DomainRegistry::new(vec!["core.jar".to_string()], vec!["app.apk".to_string()])
                .unwrap(),
        );
        registry.append_domain("apex.jar", true).unwrap();
        let resolver = CallerResolver::new(Arc::clone(&registry));

        let class = ClassId::new("Lcom/platform/Api;", "core.jar").unwrap();
        let tiers = Arc::new(TierTable::new());
        let mut builder = ClassFlagsBuilder::new();
        let specs = [
            ("sdk", Tier::Sdk),
            ("unsupported", Tier::Unsupported),
            ("conditional", Tier::ConditionallyBlocked { max_target: 28 }),
            ("blocklist", Tier::Blocklist),
            ("corePlatform", Tier::BlocklistCorePlatform),
        ];
        for (name, tier) in specs {
            builder
                .member(MemberKey::new(name, "I", MemberKind::Field), tier)
                .unwrap();
        }
        tiers.define_class(class.clone(), builder.build()).unwrap();

        let members = specs
            .iter()
            .map(|(name, _)| {
                Member::new(class.clone(), *name, "I", MemberKind::Field, AccessModifier::Public)
                    .unwrap()
            })
            .collect();
        let callers = ["core.jar", "apex.jar", "app.apk"]
            .iter()
            .map(|artifact| {
                resolver
                    .resolve(&ClassId::new("Lcom/c/C;", *artifact).unwrap())
                    .unwrap()
            })
            .collect();

        Self {
            engine: AccessDecisionEngine::new(tiers, Arc::new(ExemptionList::new())),
            members,
            callers,
        }
    }

    /// Every member/caller decision under the given policy, in a fixed order.
    fn decisions(&self, policy: &PolicyState) -> Vec<Decision> {
        let snapshot = policy.snapshot();
        let mut out = Vec::new();
        for member in &self.members {
            for caller in &self.callers {
                out.push(self.engine.decide(member, *caller, snapshot).unwrap());
            }
        }
        out
    }
}

#[test]
fn setting_the_same_value_twice_is_idempotent() {
    let grid = Grid::new();
    let policy = PolicyState::new(2);

    policy.set_policy(7);
    let once = grid.decisions(&policy);
    policy.set_policy(7);
    let twice = grid.decisions(&policy);
    assert_eq!(once, twice);
}

#[test]
fn set_then_set_old_restores_every_decision() {
    let grid = Grid::new();
    for initial in [0, 2, 27, 28, 100] {
        let policy = PolicyState::new(initial);
        let before = grid.decisions(&policy);

        let old = policy.set_policy(55);
        policy.set_policy(old);
        let after = grid.decisions(&policy);
        assert_eq!(before, after, "initial value {initial}");
    }
}

#[test]
fn disable_then_set_old_restores_every_decision() {
    let grid = Grid::new();
    let policy = PolicyState::new(2);
    let before = grid.decisions(&policy);

    let old = policy.disable_policy();
    let while_disabled = grid.decisions(&policy);
    assert!(while_disabled.iter().all(|d| d.is_allow()));

    policy.set_policy(old);
    assert_eq!(grid.decisions(&policy), before);
}

#[test]
fn scoped_disable_covers_nested_sections() {
    let grid = Grid::new();
    let policy = PolicyState::new(2);
    let before = grid.decisions(&policy);

    {
        let _outer = ScopedPolicyDisable::new(&policy);
        assert!(grid.decisions(&policy).iter().all(|d| d.is_allow()));
        {
            let _inner = ScopedPolicyDisable::new(&policy);
            assert!(grid.decisions(&policy).iter().all(|d| d.is_allow()));
        }
        // Still disabled: the outer guard is alive.
        assert!(!policy.snapshot().enabled);
    }

    assert_eq!(grid.decisions(&policy), before);
    assert_eq!(policy.saved_depth(), 0);
}

#[test]
fn restore_policy_is_stack_neutral() {
    let policy = PolicyState::new(2);
    let old = policy.set_policy(9);
    assert_eq!(policy.saved_depth(), 1);
    policy.restore_policy(old);
    assert_eq!(policy.saved_depth(), 1);
    assert_eq!(policy.get_policy(), 2);
    assert!(policy.snapshot().enabled);
}
