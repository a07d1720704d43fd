//! Enforcement boundary: the layer linkage, reflection, and native lookup
//! paths call before granting access to a member.
//!
//! A tier denial must be indistinguishable from the member not existing, so
//! it surfaces as a not-found failure, never as a security exception. On the
//! linkage path the ordinary modifier gate runs first and is the only
//! producer of member-level `IllegalAccess`; tier enforcement only runs once
//! plain visibility would have permitted the access. Reflective and native
//! lookups perform no modifier check at lookup time (that happens later, at
//! invocation, outside this boundary), but the tier gate runs on every path.
//!
//! Class-level resolution preserves two distinct failure shapes: a class
//! that resolves nowhere (`NoClassDef`) versus a class that resolved but is
//! inaccessible across a loader boundary (`IllegalAccess`).

use std::fmt;
use std::sync::Arc;

use crate::caller::CallerResolver;
use crate::decision::{AccessDecisionEngine, Decision};
use crate::domain::DomainError;
use crate::member::{ClassId, Member, MemberKind};
use crate::policy::PolicyState;
use crate::tier::ClassifyError;

// =============================================================================
// Access kinds
// =============================================================================

/// Which path reached the enforcement boundary.
///
/// The tier decision is identical on every path; the kind selects whether
/// the declared-modifier gate runs (linkage only) and feeds denial logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Reflective lookup (`getDeclaredField`-style).
    Reflection,
    /// Direct linkage at verification or first-use time.
    Linkage,
    /// JNI-style native member lookup.
    NativeLookup,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reflection => write!(f, "reflection"),
            Self::Linkage => write!(f, "linkage"),
            Self::NativeLookup => write!(f, "native-lookup"),
        }
    }
}

// =============================================================================
// Failures
// =============================================================================

/// Loader invariant violations observed at the boundary. Fatal: they
/// indicate a broken loader, not a policy outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Tier table inconsistency.
    #[error(transparent)]
    Tier(#[from] ClassifyError),

    /// Domain registry inconsistency.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Externally visible access failure.
///
/// These are the only failure shapes callers outside the engine observe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessFailure {
    /// The field does not exist, or is hidden (indistinguishable).
    #[error("no such field: {signature}")]
    NoSuchField {
        /// Textual signature of the missing field.
        signature: String,
    },

    /// The method or constructor does not exist, or is hidden.
    #[error("no such method: {signature}")]
    NoSuchMethod {
        /// Textual signature of the missing method.
        signature: String,
    },

    /// The referenced class resolved nowhere visible.
    #[error("no class definition found for {descriptor}")]
    NoClassDef {
        /// Descriptor of the unresolved class.
        descriptor: String,
    },

    /// The target resolved but plain visibility forbids the access.
    #[error("illegal access to {target} from {caller}")]
    IllegalAccess {
        /// Signature or descriptor of the inaccessible target.
        target: String,
        /// Descriptor of the accessing class.
        caller: String,
    },

    /// Fatal loader invariant violation; not a policy outcome.
    #[error("loader invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

// =============================================================================
// ClassGraph
// =============================================================================

/// A resolved class as seen from a particular resolving class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClass {
    /// Identity of the resolved class.
    pub class: ClassId,
    /// Whether the class itself is declared public.
    pub public: bool,
}

/// Class-hierarchy queries supplied by the class-loading collaborator.
///
/// The engine never walks hierarchies itself; subtype facts and class
/// resolution stay with the loader.
pub trait ClassGraph: Send + Sync {
    /// Whether `sub` is `sup` or a subclass of it.
    fn is_subclass_of(&self, sub: &ClassId, sup: &ClassId) -> bool;

    /// Resolve `descriptor` as seen from `from`, or `None` if no visible
    /// definition exists.
    fn resolve(&self, descriptor: &str, from: &ClassId) -> Option<ResolvedClass>;
}

// =============================================================================
// EnforcementAdapter
// =============================================================================

/// The boundary layer combining the modifier gate, the decision engine, and
/// failure translation.
pub struct EnforcementAdapter {
    engine: AccessDecisionEngine,
    resolver: CallerResolver,
    policy: Arc<PolicyState>,
    graph: Arc<dyn ClassGraph>,
}

impl fmt::Debug for EnforcementAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnforcementAdapter").finish_non_exhaustive()
    }
}

impl EnforcementAdapter {
    /// Assemble the boundary from its collaborators.
    #[must_use]
    pub fn new(
        engine: AccessDecisionEngine,
        resolver: CallerResolver,
        policy: Arc<PolicyState>,
        graph: Arc<dyn ClassGraph>,
    ) -> Self {
        Self {
            engine,
            resolver,
            policy,
            graph,
        }
    }

    /// The decision engine.
    #[must_use]
    pub fn engine(&self) -> &AccessDecisionEngine {
        &self.engine
    }

    /// The policy this boundary consults.
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyState> {
        &self.policy
    }

    /// The caller resolver (and through it, the domain registry).
    #[must_use]
    pub fn resolver(&self) -> &CallerResolver {
        &self.resolver
    }

    /// Check one member access from `caller` via the given path.
    ///
    /// # Errors
    ///
    /// - [`AccessFailure::IllegalAccess`] when linkage is requested and the
    ///   declared modifier forbids the access; tier evaluation does not run
    ///   in that case. Reflective and native lookups skip this gate.
    /// - [`AccessFailure::NoSuchField`] / [`AccessFailure::NoSuchMethod`]
    ///   when the tier decision denies: hidden members are
    ///   indistinguishable from absent members on every path.
    /// - [`AccessFailure::Invariant`] for loader invariant violations
    ///   (fatal).
    pub fn check_member(
        &self,
        member: &Member,
        caller: &ClassId,
        kind: AccessKind,
    ) -> Result<(), AccessFailure> {
        let ctx = self.resolver.resolve(caller).map_err(InvariantViolation::from)?;

        if kind == AccessKind::Linkage && !self.modifier_allows(member, caller)? {
            return Err(AccessFailure::IllegalAccess {
                target: member.signature(),
                caller: caller.descriptor().to_string(),
            });
        }

        let policy = self.policy.snapshot();
        match self.engine.decide(member, ctx, policy).map_err(InvariantViolation::from)? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::warn!(
                    signature = %member.signature(),
                    %reason,
                    %kind,
                    caller = caller.descriptor(),
                    "denied hidden member access"
                );
                Err(not_found(member))
            },
        }
    }

    /// Whether a member is visible to `caller` at all, for reflective
    /// enumeration (`getDeclaredFields`-style listings). Hidden members are
    /// simply omitted there, so a tier denial is `false` rather than a
    /// failure; modifiers are irrelevant to enumeration.
    ///
    /// # Errors
    ///
    /// [`AccessFailure::Invariant`] for loader invariant violations.
    pub fn is_visible(&self, member: &Member, caller: &ClassId) -> Result<bool, AccessFailure> {
        let ctx = self.resolver.resolve(caller).map_err(InvariantViolation::from)?;
        let policy = self.policy.snapshot();
        let decision = self
            .engine
            .decide(member, ctx, policy)
            .map_err(InvariantViolation::from)?;
        Ok(decision.is_allow())
    }

    /// Resolve a referenced class from `caller`, preserving the distinction
    /// between unresolved and resolved-but-inaccessible.
    ///
    /// # Errors
    ///
    /// - [`AccessFailure::NoClassDef`] when no visible definition exists.
    /// - [`AccessFailure::IllegalAccess`] when the class resolved but is
    ///   non-public across a package or loader-domain boundary.
    /// - [`AccessFailure::Invariant`] for loader invariant violations.
    pub fn resolve_class(
        &self,
        descriptor: &str,
        caller: &ClassId,
    ) -> Result<ClassId, AccessFailure> {
        let Some(resolved) = self.graph.resolve(descriptor, caller) else {
            return Err(AccessFailure::NoClassDef {
                descriptor: descriptor.to_string(),
            });
        };
        if resolved.public || self.same_runtime_package(&resolved.class, caller)? {
            return Ok(resolved.class);
        }
        Err(AccessFailure::IllegalAccess {
            target: resolved.class.descriptor().to_string(),
            caller: caller.descriptor().to_string(),
        })
    }

    /// Ordinary declared-modifier gate. Tier restrictions can forbid what
    /// this gate allows, never relax what it forbids.
    fn modifier_allows(&self, member: &Member, caller: &ClassId) -> Result<bool, AccessFailure> {
        use crate::member::AccessModifier;

        let declaring = member.declaring();
        match member.modifier() {
            AccessModifier::Public => Ok(true),
            AccessModifier::Private => Ok(caller == declaring),
            AccessModifier::PackagePrivate => self.same_runtime_package(declaring, caller),
            AccessModifier::Protected => {
                if self.same_runtime_package(declaring, caller)? {
                    Ok(true)
                } else {
                    Ok(self.graph.is_subclass_of(caller, declaring))
                }
            },
        }
    }

    /// Same package within the same loading domain.
    fn same_runtime_package(&self, a: &ClassId, b: &ClassId) -> Result<bool, AccessFailure> {
        if a.package() != b.package() {
            return Ok(false);
        }
        let registry = self.resolver.registry();
        let da = registry.domain_of(a).map_err(InvariantViolation::from)?;
        let db = registry.domain_of(b).map_err(InvariantViolation::from)?;
        Ok(da == db)
    }
}

fn not_found(member: &Member) -> AccessFailure {
    match member.kind() {
        MemberKind::Field => AccessFailure::NoSuchField {
            signature: member.signature(),
        },
        MemberKind::Method | MemberKind::Constructor => AccessFailure::NoSuchMethod {
            signature: member.signature(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::caller::CallerResolver;
    use crate::decision::AccessDecisionEngine;
    use crate::domain::DomainRegistry;
    use crate::exemption::ExemptionList;
    use crate::member::{AccessModifier, MemberKey};
    use crate::policy::PolicyState;
    use crate::tier::{ClassFlagsBuilder, Tier, TierTable};

    /// Graph over a fixed set of classes with an explicit subclass relation.
    #[derive(Default)]
    struct FixedGraph {
        classes: HashMap<String, ResolvedClass>,
        subclasses: Vec<(String, String)>,
    }

    impl ClassGraph for FixedGraph {
        fn is_subclass_of(&self, sub: &ClassId, sup: &ClassId) -> bool {
            sub.same_descriptor(sup)
                || self.subclasses.iter().any(|(s, p)| {
                    s == sub.descriptor() && p == sup.descriptor()
                })
        }

        fn resolve(&self, descriptor: &str, _from: &ClassId) -> Option<ResolvedClass> {
            self.classes.get(descriptor).cloned()
        }
    }

    struct Fixture {
        adapter: EnforcementAdapter,
    }

    fn boot_class(descriptor: &str) -> ClassId {
        ClassId::new(descriptor, "core.jar").unwrap()
    }

    fn app_class(descriptor: &str) -> ClassId {
        ClassId::new(descriptor, "app.apk").unwrap()
    }

    impl Fixture {
        fn new(graph: FixedGraph) -> Self {
            let registry = Arc::new(
                DomainRegistry::new(vec!["core.jar".to_string()], vec!["app.apk".to_string()])
                    .unwrap(),
            );
            let tiers = Arc::new(TierTable::new());
            let mut builder = ClassFlagsBuilder::new();
            for (name, tier) in [
                ("open", Tier::Sdk),
                ("hidden", Tier::Blocklist),
                ("hiddenMethod", Tier::Blocklist),
                ("packageHidden", Tier::Unsupported),
            ] {
                let (descriptor, kind) = if name == "hiddenMethod" {
                    ("()V", crate::member::MemberKind::Method)
                } else {
                    ("I", crate::member::MemberKind::Field)
                };
                builder.member(MemberKey::new(name, descriptor, kind), tier).unwrap();
            }
            tiers
                .define_class(boot_class("Lcom/platform/Api;"), builder.build())
                .unwrap();

            let engine = AccessDecisionEngine::new(tiers, Arc::new(ExemptionList::new()));
            let adapter = EnforcementAdapter::new(
                engine,
                CallerResolver::new(registry),
                Arc::new(PolicyState::default()),
                Arc::new(graph),
            );
            Self { adapter }
        }

        fn member(&self, name: &str, modifier: AccessModifier) -> Member {
            let (descriptor, kind) = if name == "hiddenMethod" {
                ("()V", crate::member::MemberKind::Method)
            } else {
                ("I", crate::member::MemberKind::Field)
            };
            Member::new(boot_class("Lcom/platform/Api;"), name, descriptor, kind, modifier)
                .unwrap()
        }
    }

    #[test]
    fn allowed_member_passes_every_path() {
        let fx = Fixture::new(FixedGraph::default());
        let member = fx.member("open", AccessModifier::Public);
        for kind in [AccessKind::Reflection, AccessKind::Linkage, AccessKind::NativeLookup] {
            fx.adapter
                .check_member(&member, &app_class("Lcom/app/Main;"), kind)
                .unwrap();
        }
    }

    #[test]
    fn hidden_field_reports_no_such_field() {
        let fx = Fixture::new(FixedGraph::default());
        let member = fx.member("hidden", AccessModifier::Public);
        let err = fx
            .adapter
            .check_member(&member, &app_class("Lcom/app/Main;"), AccessKind::Reflection)
            .unwrap_err();
        assert!(matches!(err, AccessFailure::NoSuchField { .. }));
    }

    #[test]
    fn hidden_method_reports_no_such_method() {
        let fx = Fixture::new(FixedGraph::default());
        let member = fx.member("hiddenMethod", AccessModifier::Public);
        let err = fx
            .adapter
            .check_member(&member, &app_class("Lcom/app/Main;"), AccessKind::Linkage)
            .unwrap_err();
        assert!(matches!(err, AccessFailure::NoSuchMethod { .. }));
    }

    #[test]
    fn modifier_gate_precedes_tier_gate_at_linkage() {
        // A private blocklisted field linked cross-class fails the plain
        // visibility check, not the hidden-member translation.
        let fx = Fixture::new(FixedGraph::default());
        let member = fx.member("hidden", AccessModifier::Private);
        let err = fx
            .adapter
            .check_member(&member, &app_class("Lcom/app/Main;"), AccessKind::Linkage)
            .unwrap_err();
        assert!(matches!(err, AccessFailure::IllegalAccess { .. }));
    }

    #[test]
    fn reflective_lookup_skips_the_modifier_gate() {
        // getDeclaredField-style discovery sees private members; only the
        // tier gate can hide them at lookup time.
        let fx = Fixture::new(FixedGraph::default());
        let open = fx.member("open", AccessModifier::Private);
        fx.adapter
            .check_member(&open, &app_class("Lcom/app/Main;"), AccessKind::Reflection)
            .unwrap();

        let hidden = fx.member("hidden", AccessModifier::Private);
        let err = fx
            .adapter
            .check_member(&hidden, &app_class("Lcom/app/Main;"), AccessKind::Reflection)
            .unwrap_err();
        assert!(matches!(err, AccessFailure::NoSuchField { .. }));
    }

    #[test]
    fn package_private_requires_same_domain() {
        // Same package name, but the caller lives in the app domain while
        // the declaring class is boot: different runtime packages.
        let fx = Fixture::new(FixedGraph::default());
        let member = fx.member("open", AccessModifier::PackagePrivate);
        let err = fx
            .adapter
            .check_member(
                &member,
                &app_class("Lcom/platform/Impostor;"),
                AccessKind::Linkage,
            )
            .unwrap_err();
        assert!(matches!(err, AccessFailure::IllegalAccess { .. }));
    }

    #[test]
    fn protected_allows_declared_subclass() {
        let graph = FixedGraph {
            classes: HashMap::new(),
            subclasses: vec![(
                "Lcom/app/Child;".to_string(),
                "Lcom/platform/Api;".to_string(),
            )],
        };
        let fx = Fixture::new(graph);
        let member = fx.member("open", AccessModifier::Protected);
        fx.adapter
            .check_member(&member, &app_class("Lcom/app/Child;"), AccessKind::Linkage)
            .unwrap();
    }

    #[test]
    fn tier_denial_applies_even_to_subclass_access() {
        // Tier restrictions never relax: the subclass passes the modifier
        // gate but the blocklist still hides the member.
        let graph = FixedGraph {
            classes: HashMap::new(),
            subclasses: vec![(
                "Lcom/app/Child;".to_string(),
                "Lcom/platform/Api;".to_string(),
            )],
        };
        let fx = Fixture::new(graph);
        let member = fx.member("hidden", AccessModifier::Protected);
        let err = fx
            .adapter
            .check_member(&member, &app_class("Lcom/app/Child;"), AccessKind::Linkage)
            .unwrap_err();
        assert!(matches!(err, AccessFailure::NoSuchField { .. }));
    }

    #[test]
    fn unresolved_class_is_no_class_def() {
        let fx = Fixture::new(FixedGraph::default());
        let err = fx
            .adapter
            .resolve_class("Lcom/gone/Missing;", &app_class("Lcom/app/Main;"))
            .unwrap_err();
        assert!(matches!(err, AccessFailure::NoClassDef { .. }));
    }

    #[test]
    fn resolved_non_public_class_across_domains_is_illegal_access() {
        let mut classes = HashMap::new();
        classes.insert(
            "Lcom/platform/Internal;".to_string(),
            ResolvedClass {
                class: boot_class("Lcom/platform/Internal;"),
                public: false,
            },
        );
        let fx = Fixture::new(FixedGraph {
            classes,
            subclasses: Vec::new(),
        });
        let err = fx
            .adapter
            .resolve_class("Lcom/platform/Internal;", &app_class("Lcom/platform/Main;"))
            .unwrap_err();
        assert!(matches!(err, AccessFailure::IllegalAccess { .. }));
    }

    #[test]
    fn resolved_public_class_is_accessible() {
        let mut classes = HashMap::new();
        classes.insert(
            "Lcom/platform/Api;".to_string(),
            ResolvedClass {
                class: boot_class("Lcom/platform/Api;"),
                public: true,
            },
        );
        let fx = Fixture::new(FixedGraph {
            classes,
            subclasses: Vec::new(),
        });
        let resolved = fx
            .adapter
            .resolve_class("Lcom/platform/Api;", &app_class("Lcom/app/Main;"))
            .unwrap();
        assert_eq!(resolved.descriptor(), "Lcom/platform/Api;");
    }

    #[test]
    fn enumeration_omits_hidden_members_only() {
        let fx = Fixture::new(FixedGraph::default());
        let caller = app_class("Lcom/app/Main;");
        let members = [
            fx.member("open", AccessModifier::Private),
            fx.member("hidden", AccessModifier::Public),
        ];
        let visible: Vec<_> = members
            .iter()
            .filter(|m| fx.adapter.is_visible(m, &caller).unwrap())
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(visible, ["open"]);
    }

    #[test]
    fn disabling_policy_reveals_hidden_members() {
        let fx = Fixture::new(FixedGraph::default());
        let member = fx.member("hidden", AccessModifier::Public);
        let caller = app_class("Lcom/app/Main;");

        let old = fx.adapter.policy().disable_policy();
        fx.adapter
            .check_member(&member, &caller, AccessKind::Reflection)
            .unwrap();

        fx.adapter.policy().set_policy(old);
        let err = fx
            .adapter
            .check_member(&member, &caller, AccessKind::Reflection)
            .unwrap_err();
        assert!(matches!(err, AccessFailure::NoSuchField { .. }));
    }
}
