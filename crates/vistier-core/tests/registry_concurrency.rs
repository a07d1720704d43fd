//! Concurrent boot-classpath extension against a hot decision path.
//!
//! Appends must never expose a torn registry to readers: a thread deciding
//! for an already-loaded member sees stable results throughout, and every
//! snapshot it takes is internally consistent (boot entries ordered before
//! the app domain, monotonically growing).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use vistier_core::caller::CallerResolver;
use vistier_core::decision::{AccessDecisionEngine, Decision, DenyReason};
use vistier_core::domain::{DomainKind, DomainRegistry};
use vistier_core::exemption::ExemptionList;
use vistier_core::member::{AccessModifier, ClassId, Member, MemberKey, MemberKind};
use vistier_core::policy::PolicyState;
use vistier_core::tier::{ClassFlagsBuilder, Tier, TierTable};

const APPENDS_PER_WRITER: usize = 64;

fn fixture() -> (Arc<DomainRegistry>, AccessDecisionEngine, Member) {
    let registry = Arc::new(
        DomainRegistry::new(vec!["core.jar".to_string()], vec!["app.apk".to_string()]).unwrap(),
    );
    let tiers = Arc::new(TierTable::new());
    let class = ClassId::new("Lcom/platform/Api;", "core.jar").unwrap();
    let mut builder = ClassFlagsBuilder::new();
    builder
        .member(MemberKey::new("secret", "I", MemberKind::Field), Tier::Blocklist)
        .unwrap();
    tiers.define_class(class.clone(), builder.build()).unwrap();
    let member = Member::new(class, "secret", "I", MemberKind::Field, AccessModifier::Public)
        .unwrap();
    let engine = AccessDecisionEngine::new(tiers, Arc::new(ExemptionList::new()));
    (registry, engine, member)
}

#[test]
fn decisions_stay_stable_while_domains_are_appended() {
    let (registry, engine, member) = fixture();
    let policy = PolicyState::new(2);
    let resolver = CallerResolver::new(Arc::clone(&registry));
    let done = Arc::new(AtomicBool::new(false));

    thread::scope(|scope| {
        let writers: Vec<_> = (0..2)
            .map(|writer| {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for i in 0..APPENDS_PER_WRITER {
                        registry
                            .append_domain(format!("segment-{writer}-{i}.jar"), i % 2 == 0)
                            .unwrap();
                    }
                })
            })
            .collect();

        {
            let done = Arc::clone(&done);
            let engine = &engine;
            let member = &member;
            let resolver = &resolver;
            let policy = &policy;
            scope.spawn(move || {
                let caller_class = ClassId::new("Lcom/app/Main;", "app.apk").unwrap();
                while !done.load(Ordering::Acquire) {
                    let caller = resolver.resolve(&caller_class).unwrap();
                    let decision = engine.decide(member, caller, policy.snapshot()).unwrap();
                    assert_eq!(decision, Decision::Deny(DenyReason::Blocklist));
                }
            });
        }

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
    });

    // Both writers completed every append exactly once.
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 2 + 2 * APPENDS_PER_WRITER);
}

#[test]
fn snapshots_are_internally_consistent_during_appends() {
    let (registry, _engine, _member) = fixture();
    let stop = Arc::new(AtomicBool::new(false));

    thread::scope(|scope| {
        {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            scope.spawn(move || {
                for i in 0..APPENDS_PER_WRITER {
                    registry.append_domain(format!("seg-{i}.jar"), false).unwrap();
                }
                stop.store(true, Ordering::Release);
            });
        }

        let registry = Arc::clone(&registry);
        let stop = Arc::clone(&stop);
        scope.spawn(move || {
            let mut last_len = 0;
            loop {
                let snapshot = registry.snapshot();
                // Append-only: never shrinks.
                assert!(snapshot.len() >= last_len);
                last_len = snapshot.len();
                // The app domain is always last; everything before is boot.
                let (app, boot) = snapshot.split_last().unwrap();
                assert_eq!(app.kind(), DomainKind::App);
                assert!(boot.iter().all(|entry| entry.kind().is_boot()));
                if stop.load(Ordering::Acquire) {
                    break;
                }
            }
        });
    });

    assert_eq!(registry.snapshot().len(), 2 + APPENDS_PER_WRITER);
}

#[test]
fn concurrent_duplicate_appends_admit_exactly_one_winner() {
    let (registry, _engine, _member) = fixture();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                scope.spawn(move || registry.append_domain("contested.jar", false).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    });
}
