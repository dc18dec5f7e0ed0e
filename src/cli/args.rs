//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    asset::AssetCommands, bootstrap::BootstrapArgs, part::PartArgs, reset::ResetArgs,
};

#[derive(Parser)]
#[command(name = "partmaster")]
#[command(author, version, about = "Part master-data store")]
#[command(long_about = "Migrates the part master store, imports export directories into it, and manages the content-addressed part image store.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Store file (default: PARTMASTER_DB, config file, then the data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Asset store root (default: PARTMASTER_ASSETS, config file, then the data directory)
    #[arg(long, global = true)]
    pub assets: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring the store to the current schema
    Migrate,

    /// Import an export directory into the store
    Bootstrap(BootstrapArgs),

    /// Show row counts per table and the schema version
    Status,

    /// Show one part with its defect recommendations
    Part(PartArgs),

    /// Part image store operations
    #[command(subcommand)]
    Asset(AssetCommands),

    /// Delete the store so the next run migrates and imports from scratch
    Reset(ResetArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Auto,
    /// JSON on stdout
    Json,
}
