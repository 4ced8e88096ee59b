//! Docforge CLI: maintenance commands for the documentation entity cache.
//!
//! Provides `docforge cache stats` to inspect stored buckets, `docforge cache gc`
//! to drop buckets written under other cache format versions, and
//! `docforge cache clear` to remove every bucket.

#![warn(missing_docs)]

mod cache;
mod logging;
mod project;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Docforge: documentation generator tooling.
#[derive(Parser, Debug)]
#[command(name = "docforge", version, about = "Docforge documentation generator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom configuration file, or to a project directory.
    ///
    /// A file is loaded as is and its directory becomes the project root.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and maintain the entity cache.
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Subcommands of `docforge cache`.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show stored buckets per cache format version.
    Stats(StatsArgs),
    /// Remove buckets written under other cache format versions.
    Gc,
    /// Remove every stored bucket.
    Clear,
}

/// Arguments for the `docforge cache stats` subcommand.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file or project directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var_os("TERM").is_some(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    logging::init(&global);

    let result = match cli.command {
        Command::Cache(CacheCommand::Stats(ref args)) => cache::stats(args, &global),
        Command::Cache(CacheCommand::Gc) => cache::gc(&global),
        Command::Cache(CacheCommand::Clear) => cache::clear(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            tracing::error!("{e}");
            process::exit(1);
        }
    }
}
