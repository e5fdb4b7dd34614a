//! Monoid Cache CLI - Field policy inspection and fetch replay
//!
//! A command-line interface for the console's paginated field cache.
//!
//! # Usage
//!
//! ```bash
//! # List the effective field policies
//! monoid-cache policies
//!
//! # Replay a recorded sequence of page fetches and reads
//! monoid-cache replay fetches.json
//!
//! # Create a local configuration file
//! monoid-cache config init
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use monoid_cache_config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// Monoid Cache - Paginated field cache tooling
#[derive(Parser, Debug)]
#[command(name = "monoid-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Directory whose .monoid-cache/config.toml is loaded
    #[arg(long, short = 'd', global = true, env = "MONOID_CACHE_DIR")]
    dir: Option<PathBuf>,

    /// Path to configuration file (replaces global and local config)
    #[arg(long, short = 'c', global = true, env = "MONOID_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Maximum number of cached snapshots
    #[arg(long, global = true, env = "MONOID_CACHE_MAX_SNAPSHOTS")]
    max_snapshots: Option<usize>,

    /// Maximum end position (offset + page length) a merged page may reach
    #[arg(long, global = true, env = "MONOID_CACHE_MAX_WINDOW_END")]
    max_window_end: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MONOID_CACHE_LOG")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

/// Parse log format from string
fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse()
        .map_err(|e: monoid_cache_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> monoid_cache_config::ConfigOverrides {
        monoid_cache_config::ConfigOverrides {
            max_snapshots: self.max_snapshots,
            max_window_end: self.max_window_end,
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the effective field policies
    Policies(commands::policies::PoliciesArgs),

    /// Replay a script of page fetches and reads against a fresh cache
    Replay(commands::replay::ReplayArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging falls back to flags alone when the config cannot be loaded;
    // the load error is reported by the command that needs it.
    let loaded = commands::load_config(&cli.global);
    init_tracing(&cli.global, loaded.as_ref().ok().map(|c| &c.logging))?;

    match cli.command {
        Commands::Policies(args) => commands::policies::execute(args, loaded?),
        Commands::Replay(args) => commands::replay::execute(args, loaded?, &cli.global),
        Commands::Config(cmd) => commands::config::execute(cmd, &cli.global),
    }
}

/// Install the stderr subscriber.
fn init_tracing(global: &GlobalOptions, logging: Option<&LoggingConfig>) -> Result<()> {
    let log_level = if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        global
            .log_level
            .as_deref()
            .or_else(|| logging.map(|l| l.level.as_str()))
            .and_then(|level| level.parse::<Level>().ok())
            .unwrap_or(Level::INFO)
    };

    let format = global
        .log_format
        .or_else(|| logging.map(|l| l.format))
        .unwrap_or_default();

    match format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
