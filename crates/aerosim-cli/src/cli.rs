//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Headless GPS sensor simulation
#[derive(Parser, Debug)]
#[command(name = "aerosim", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Step a scene and print every bridged record
    Run(RunArgs),

    /// Check that a scene loads and every plugin configures
    Validate(ValidateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Scene file (TOML)
    #[arg(short, long, env = "AEROSIM_SCENE")]
    pub scene: PathBuf,

    /// Number of world steps; overrides the scene and AEROSIM_STEPS
    #[arg(long)]
    pub steps: Option<u64>,

    /// Print only the summary, not each bridged record
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Scene file (TOML)
    #[arg(short, long, env = "AEROSIM_SCENE")]
    pub scene: PathBuf,
}
