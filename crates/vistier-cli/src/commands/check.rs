//! `vistier check`: decide one member access under a configuration and
//! print the externally visible outcome.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use vistier_core::caller::CallerResolver;
use vistier_core::config::EngineConfig;
use vistier_core::decision::AccessDecisionEngine;
use vistier_core::enforce::{AccessKind, ClassGraph, EnforcementAdapter, ResolvedClass};
use vistier_core::member::{AccessModifier, ClassId, Member, MemberKind, parse_signature};
use vistier_core::policy::PolicyState;

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Member signature, e.g. "Lcom/platform/Api;->secret:I"
    pub signature: String,

    /// Artifact the calling class was loaded from
    #[arg(long)]
    pub caller_artifact: String,

    /// Access path to simulate
    #[arg(long, value_enum, default_value = "reflection")]
    pub kind: KindArg,

    /// Declared modifier of the member
    #[arg(long, value_enum, default_value = "public")]
    pub modifier: ModifierArg,

    /// Override the configured policy value
    #[arg(long)]
    pub policy_value: Option<i32>,

    /// Run with enforcement disabled
    #[arg(long)]
    pub disable: bool,
}

/// CLI mirror of [`AccessKind`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    /// Reflective lookup.
    Reflection,
    /// Direct linkage.
    Linkage,
    /// JNI-style native lookup.
    Native,
}

impl From<KindArg> for AccessKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Reflection => Self::Reflection,
            KindArg::Linkage => Self::Linkage,
            KindArg::Native => Self::NativeLookup,
        }
    }
}

/// CLI mirror of [`AccessModifier`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModifierArg {
    /// Public member.
    Public,
    /// Package-private member.
    Package,
    /// Protected member.
    Protected,
    /// Private member.
    Private,
}

impl From<ModifierArg> for AccessModifier {
    fn from(modifier: ModifierArg) -> Self {
        match modifier {
            ModifierArg::Public => Self::Public,
            ModifierArg::Package => Self::PackagePrivate,
            ModifierArg::Protected => Self::Protected,
            ModifierArg::Private => Self::Private,
        }
    }
}

/// Simulation has no class hierarchy: no subtype facts, no resolvable
/// classes.
struct NoGraph;

impl ClassGraph for NoGraph {
    fn is_subclass_of(&self, _sub: &ClassId, _sup: &ClassId) -> bool {
        false
    }

    fn resolve(&self, _descriptor: &str, _from: &ClassId) -> Option<ResolvedClass> {
        None
    }
}

/// Returns whether the access was allowed.
pub fn run(config_path: &Path, args: &CheckArgs) -> Result<bool> {
    let config = EngineConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let parsed = parse_signature(&args.signature).context("parsing member signature")?;
    let flag = config
        .flags
        .iter()
        .find(|entry| entry.signature == args.signature);
    let declaring_artifact = match flag.and_then(|entry| entry.artifact.clone()) {
        Some(artifact) => artifact,
        None => match config.domains.boot.first() {
            Some(artifact) => artifact.clone(),
            None => bail!("config has no boot artifacts to place {:?} in", args.signature),
        },
    };

    let declaring = ClassId::new(parsed.class_descriptor.clone(), declaring_artifact)?;
    let member = Member::new(
        declaring,
        parsed.name.clone(),
        parsed.descriptor.clone(),
        parsed.kind,
        args.modifier.into(),
    )?;
    let caller = ClassId::new("Lvistier/cli/SimulatedCaller;", args.caller_artifact.clone())
        .context("caller artifact")?;

    let registry = Arc::new(config.build_registry()?);
    let engine = AccessDecisionEngine::new(
        Arc::new(config.build_tier_table()?),
        Arc::new(config.build_exemptions()?),
    );
    let policy = match args.policy_value {
        Some(value) => Arc::new(PolicyState::new(value)),
        None => config.build_policy(),
    };
    if args.disable {
        let _ = policy.disable_policy();
    }
    let adapter = EnforcementAdapter::new(
        engine,
        CallerResolver::new(registry),
        policy,
        Arc::new(NoGraph),
    );

    match adapter.check_member(&member, &caller, args.kind.into()) {
        Ok(()) => {
            println!("allow\t{}", args.signature);
            Ok(true)
        },
        Err(failure) => {
            println!("deny\t{}\t{failure}", args.signature);
            Ok(false)
        },
    }
}
