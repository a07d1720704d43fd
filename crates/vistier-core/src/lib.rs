#![warn(missing_docs)]
// Tier and domain vocabulary (Sdk, Blocklist, boot class path) reads badly
// when backtick-wrapped throughout; suppress the doc-formatting pedantry
// crate-wide instead of per item.
#![allow(clippy::doc_markdown)]

//! vistier-core - Member Visibility Enforcement Engine
//!
//! This library decides, for every field, method, and constructor access
//! performed via reflection, direct linkage, or native lookup, whether the
//! caller is permitted to see or invoke that member. The decision combines
//! a per-member trust tier assigned at class-definition time, the caller's
//! class-loading domain, and a mutable process-wide enforcement policy.
//!
//! The engine is an in-process library boundary: no wire protocol, no
//! persistence, no background tasks. Every operation is synchronous and
//! bounded; the dominant read path (member access checks) runs against
//! immutable snapshots and a single atomic policy word.
//!
//! # Modules
//!
//! - [`member`]: member identity, class identity, and the textual signature
//!   form used by flag files and denial logs
//! - [`tier`]: trust tiers and the write-once-per-class tier table
//! - [`domain`]: class-loading domains with copy-on-append boot extension
//! - [`policy`]: the enforcement policy word and its save/restore surface
//! - [`caller`]: per-access caller classification
//! - [`exemption`]: runtime-supplied allow-exemption prefixes
//! - [`decision`]: the allow/deny decision engine
//! - [`enforce`]: the boundary adapter translating denials into
//!   linkage-style failures
//! - [`config`]: TOML configuration for policy, domains, and flags
//!
//! # Typical wiring
//!
//! The class-loading subsystem populates the tier table and domain registry,
//! then every access path routes through one [`enforce::EnforcementAdapter`]:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use vistier_core::caller::CallerResolver;
//! use vistier_core::decision::AccessDecisionEngine;
//! use vistier_core::domain::DomainRegistry;
//! use vistier_core::exemption::ExemptionList;
//! use vistier_core::policy::PolicyState;
//! use vistier_core::tier::TierTable;
//!
//! let registry = Arc::new(DomainRegistry::new(
//!     vec!["core.jar".to_string()],
//!     vec!["app.apk".to_string()],
//! )?);
//! let engine = AccessDecisionEngine::new(
//!     Arc::new(TierTable::new()),
//!     Arc::new(ExemptionList::new()),
//! );
//! let resolver = CallerResolver::new(registry);
//! let policy = Arc::new(PolicyState::default());
//! # let _ = (engine, resolver, policy);
//! # Ok::<(), vistier_core::domain::DomainError>(())
//! ```

pub mod caller;
pub mod config;
pub mod decision;
pub mod domain;
pub mod enforce;
pub mod exemption;
pub mod member;
pub mod policy;
pub mod tier;

pub use caller::{CallerContext, CallerResolver};
pub use decision::{AccessDecisionEngine, ConditionalGate, Decision, DenyReason, TargetLevelGate};
pub use domain::{DomainError, DomainId, DomainKind, DomainRegistry};
pub use enforce::{AccessFailure, AccessKind, ClassGraph, EnforcementAdapter, ResolvedClass};
pub use exemption::ExemptionList;
pub use member::{AccessModifier, ClassId, Member, MemberKind, parse_signature};
pub use policy::{PolicySnapshot, PolicyState, ScopedPolicyDisable};
pub use tier::{ClassFlags, ClassFlagsBuilder, ClassifyError, Tier, TierTable};
