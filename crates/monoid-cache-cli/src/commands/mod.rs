//! CLI command implementations

pub mod config;
pub mod policies;
pub mod replay;

use std::path::PathBuf;

use anyhow::{Context, Result};
use monoid_cache_config::{ConfigLoader, MonoidCacheConfig};
use monoid_cache_core::{FieldCache, FieldPolicyRegistry, JsonFieldCache, TypePolicies};

use crate::GlobalOptions;

/// Resolve the config directory from options or current directory.
pub fn resolve_dir(global: &GlobalOptions) -> Result<PathBuf> {
    match global.dir {
        Some(ref dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Load configuration, honoring an explicit config file and CLI overrides.
pub fn load_config(global: &GlobalOptions) -> Result<MonoidCacheConfig> {
    let overrides = global.to_config_overrides();
    let mut loader = ConfigLoader::new();

    if let Some(ref config_path) = global.config {
        return loader
            .load_file(config_path, Some(&overrides))
            .context("Failed to load config file");
    }

    let dir = resolve_dir(global)?;
    loader
        .load(&dir, Some(&overrides))
        .context("Failed to load configuration")
}

/// Console defaults plus the policies declared in config.
///
/// A config entry for a field the console already covers replaces it.
pub fn build_policies(config: &MonoidCacheConfig) -> Result<TypePolicies> {
    let mut policies = TypePolicies::console_defaults()?;
    for entry in &config.policies {
        policies
            .register_field_policy(&entry.type_name, &entry.field, entry.to_field_policy())
            .with_context(|| {
                format!(
                    "Failed to register policy for {}.{}",
                    entry.type_name, entry.field
                )
            })?;
    }
    Ok(policies)
}

/// Build an empty cache sized by config.
pub fn build_cache(config: &MonoidCacheConfig) -> Result<JsonFieldCache> {
    let policies = build_policies(config)?;
    let cache = FieldCache::with_capacity(policies, config.cache.max_snapshots)
        .with_max_window_end(config.cache.max_window_end);
    Ok(JsonFieldCache::from_cache(cache))
}

/// Print info message (respects quiet mode)
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
