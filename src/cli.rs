//! CLI argument parsing for Mirador

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for analysis reports
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "mirador")]
#[command(version)]
#[command(about = "Scientific integrity linter for Python: mirages, leakage, units", long_about = None)]
pub struct Cli {
    /// Files or directories to analyze (directories are searched recursively)
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Path to configuration file (default: .mirador.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Run only the listed guards (comma-separated: mirage,leakage,hypothesis,unit,tensor)
    #[arg(long = "guards", value_delimiter = ',', value_name = "GUARD")]
    pub guards: Vec<String>,

    /// Apply mirage auto-fixes in place (or to --output)
    #[arg(long = "fix")]
    pub fix: bool,

    /// Show the unified diff of the fixes
    #[arg(long = "diff")]
    pub diff: bool,

    /// Show what --fix would change without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Ask for confirmation before applying each fix
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Write fixed source to this file instead of in place (single file only)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Per-file analysis budget in seconds, overriding the config (0 disables)
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}
