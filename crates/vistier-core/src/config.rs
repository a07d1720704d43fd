//! Engine configuration: initial policy, domain artifact lists, exemption
//! prefixes, and member tier flags, parsed from TOML.
//!
//! Parsing fails closed: unknown keys are rejected where the schema allows
//! it, every list is bounded, and a duplicate flag signature is a
//! configuration error rather than a last-writer-wins surprise.
//!
//! ```toml
//! [policy]
//! value = 2
//! exemptions = ["Lcom/legacy/"]
//!
//! [domains]
//! boot = ["core.jar"]
//! app = ["app.apk"]
//!
//! [[flags]]
//! signature = "Lcom/platform/Api;->secret:I"
//! tier = "blocklist"
//!
//! [[flags]]
//! signature = "Lcom/platform/Api;->old()V"
//! tier = "conditionally_blocked"
//! max_target = 28
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainRegistry, MAX_ARTIFACTS_PER_DOMAIN};
use crate::exemption::{ExemptionError, ExemptionList, MAX_EXEMPTIONS};
use crate::member::{ClassId, SignatureError, parse_signature};
use crate::policy::{POLICY_ENFORCE, PolicyState};
use crate::tier::{ClassFlagsBuilder, ClassifyError, Tier, TierTable};

/// Maximum number of flag entries in one configuration.
pub const MAX_FLAG_ENTRIES: usize = 262_144;

// =============================================================================
// Errors
// =============================================================================

/// Configuration load or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML was invalid or violated the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A semantic constraint was violated.
    #[error("invalid config: {0}")]
    Validation(String),

    /// A flag entry carried a malformed member signature.
    #[error("invalid flag signature: {0}")]
    Signature(#[from] SignatureError),

    /// Domain lists could not form a registry.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Flag entries could not populate the tier table.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// Exemption prefixes violated their bounds.
    #[error(transparent)]
    Exemption(#[from] ExemptionError),
}

// =============================================================================
// Schema
// =============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Policy section.
    #[serde(default)]
    pub policy: PolicySection,

    /// Domain artifact lists.
    #[serde(default)]
    pub domains: DomainsSection,

    /// Member tier flags.
    #[serde(default)]
    pub flags: Vec<FlagEntry>,
}

/// `[policy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Initial policy value; 0 starts with enforcement off.
    #[serde(default = "default_policy_value")]
    pub value: i32,

    /// Signature prefixes exempted from the `unsupported` gate.
    #[serde(default)]
    pub exemptions: Vec<String>,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            value: default_policy_value(),
            exemptions: Vec::new(),
        }
    }
}

fn default_policy_value() -> i32 {
    POLICY_ENFORCE
}

/// `[domains]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainsSection {
    /// Boot class path artifacts, in match order.
    #[serde(default)]
    pub boot: Vec<String>,

    /// Application artifacts.
    #[serde(default)]
    pub app: Vec<String>,
}

/// One `[[flags]]` entry: a member signature and its tier.
///
/// `deny_unknown_fields` cannot apply here because the tier tag is
/// flattened; unknown keys in flag entries are ignored by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagEntry {
    /// Textual member signature.
    pub signature: String,

    /// Defining artifact of the declaring class. Defaults to the first boot
    /// artifact.
    #[serde(default)]
    pub artifact: Option<String>,

    /// Trust tier, tagged by the `tier` key.
    #[serde(flatten)]
    pub tier: Tier,
}

impl EngineConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] on read, parse, or validation failure.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration string.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] on parse or validation failure.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints: bounds, a non-empty boot class path
    /// when flags are present, well-formed signatures, and no duplicate
    /// flag signatures.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] or [`ConfigError::Signature`] naming the
    /// first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domains.boot.len() > MAX_ARTIFACTS_PER_DOMAIN
            || self.domains.app.len() > MAX_ARTIFACTS_PER_DOMAIN
        {
            return Err(ConfigError::Validation(format!(
                "domain artifact list exceeds {MAX_ARTIFACTS_PER_DOMAIN} entries"
            )));
        }
        if self.policy.exemptions.len() > MAX_EXEMPTIONS {
            return Err(ConfigError::Validation(format!(
                "{} exemption prefixes (max {MAX_EXEMPTIONS})",
                self.policy.exemptions.len()
            )));
        }
        if self.flags.len() > MAX_FLAG_ENTRIES {
            return Err(ConfigError::Validation(format!(
                "{} flag entries (max {MAX_FLAG_ENTRIES})",
                self.flags.len()
            )));
        }
        if !self.flags.is_empty() && self.domains.boot.is_empty() {
            return Err(ConfigError::Validation(
                "flag entries require a non-empty boot class path".to_string(),
            ));
        }
        let mut seen = HashMap::new();
        for entry in &self.flags {
            parse_signature(&entry.signature)?;
            if let Some(artifact) = &entry.artifact {
                if !self.domains.boot.contains(artifact) && !self.domains.app.contains(artifact) {
                    return Err(ConfigError::Validation(format!(
                        "flag artifact {artifact:?} is not a registered domain artifact"
                    )));
                }
            }
            let artifact = entry.artifact.as_deref().unwrap_or_default();
            if seen
                .insert((entry.signature.clone(), artifact.to_string()), ())
                .is_some()
            {
                return Err(ConfigError::Validation(format!(
                    "duplicate flag signature {:?}",
                    entry.signature
                )));
            }
        }
        Ok(())
    }

    /// Build the domain registry from the `[domains]` section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Domain`] for duplicate artifacts or capacity
    /// violations.
    pub fn build_registry(&self) -> Result<DomainRegistry, ConfigError> {
        Ok(DomainRegistry::new(
            self.domains.boot.clone(),
            self.domains.app.clone(),
        )?)
    }

    /// Build a tier table populated from the `[[flags]]` entries, grouped
    /// into one batch definition per declaring class.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for malformed signatures, duplicate members, or a
    /// missing boot artifact to default to.
    pub fn build_tier_table(&self) -> Result<TierTable, ConfigError> {
        let table = TierTable::new();
        let mut by_class: HashMap<ClassId, ClassFlagsBuilder> = HashMap::new();
        for entry in &self.flags {
            let parsed = parse_signature(&entry.signature)?;
            let artifact = match &entry.artifact {
                Some(artifact) => artifact.clone(),
                None => self
                    .domains
                    .boot
                    .first()
                    .cloned()
                    .ok_or_else(|| {
                        ConfigError::Validation(
                            "flag entries require a non-empty boot class path".to_string(),
                        )
                    })?,
            };
            let class = ClassId::new(parsed.class_descriptor.clone(), artifact)?;
            by_class.entry(class).or_default().member(
                crate::member::MemberKey::new(parsed.name, parsed.descriptor, parsed.kind),
                entry.tier,
            )?;
        }
        for (class, builder) in by_class {
            table.define_class(class, builder.build())?;
        }
        Ok(table)
    }

    /// Build the exemption list from the `[policy]` section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Exemption`] if a prefix violates its bounds.
    pub fn build_exemptions(&self) -> Result<ExemptionList, ConfigError> {
        let list = ExemptionList::new();
        list.set_exemptions(self.policy.exemptions.clone())?;
        Ok(list)
    }

    /// Build the policy state with the configured initial value.
    #[must_use]
    pub fn build_policy(&self) -> Arc<PolicyState> {
        Arc::new(PolicyState::new(self.policy.value))
    }
}
