//! `vistier flags`: list every flagged member with its tier.

use std::path::Path;

use anyhow::{Context, Result};
use vistier_core::config::EngineConfig;

/// Print each flag entry as `<tier>\t<signature>`, in file order.
pub fn run(config_path: &Path) -> Result<()> {
    let config = EngineConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if config.flags.is_empty() {
        println!("no flagged members in {}", config_path.display());
        return Ok(());
    }

    for entry in &config.flags {
        println!("{}\t{}", entry.tier, entry.signature);
    }
    Ok(())
}
