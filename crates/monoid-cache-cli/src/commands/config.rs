//! Config command - View and manage configuration
//!
//! - Show configuration file paths
//! - Show the effective (merged) configuration
//! - Write a default configuration file (local or global)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use monoid_cache_config::ConfigLoader;
use serde::Serialize;

use super::{load_config, print_info, resolve_dir};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show configuration file paths
    Path(PathArgs),

    /// Show the effective configuration
    Show(ShowArgs),

    /// Write a default configuration file
    Init(InitArgs),
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Write the global config (~/.monoid-cache/config.toml) instead of local
    #[arg(long)]
    global: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, global: &GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Path(args) => execute_path(args, global),
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
    }
}

fn execute_path(args: PathArgs, global: &GlobalOptions) -> Result<()> {
    let dir = resolve_dir(global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&dir);

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        global: global_path,
        local_exists: local_path.exists(),
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let status = |exists: bool| if exists { "exists" } else { "not found" };
    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        status(paths.local_exists)
    );
    Ok(())
}

fn execute_show(args: ShowArgs, global: &GlobalOptions) -> Result<()> {
    let config = load_config(global)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
        print!("{}", rendered);
    }
    Ok(())
}

fn execute_init(args: InitArgs, global: &GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader.init_global()?
    } else {
        loader.init_local(&resolve_dir(global)?)?
    };
    print_info(&format!("Config: {}", path.display()), global.quiet);
    Ok(())
}
