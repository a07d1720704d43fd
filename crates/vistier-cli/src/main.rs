//! vistier - member visibility flag inspector
//!
//! Loads an engine configuration (domains, tier flags, policy) and answers
//! tier and decision queries for member signatures, printing the failure
//! shape an embedding runtime would surface.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// vistier - member visibility flag inspector
#[derive(Parser, Debug)]
#[command(name = "vistier")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long, default_value = "vistier.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every flagged member with its tier
    Flags,

    /// Decide one member access and print the externally visible outcome
    Check(commands::check::CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(allowed) => {
            if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        },
    }
}

fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Flags => {
            commands::flags::run(&cli.config)?;
            Ok(true)
        },
        Commands::Check(args) => commands::check::run(&cli.config, args),
    }
}
