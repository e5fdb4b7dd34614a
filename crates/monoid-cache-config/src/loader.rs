//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.monoid-cache/config.toml`
//! 2. Local config: `.monoid-cache/config.toml` (in the working directory)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    CacheSettings, ConfigOverrides, LogFormat, LoggingConfig, MonoidCacheConfig, PolicyConfig,
    DEFAULT_MAX_SNAPSHOTS, DEFAULT_MAX_WINDOW_END,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both global and local.
const CONFIG_DIR: &str = ".monoid-cache";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.monoid-cache`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<MonoidCacheConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.monoid-cache`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a directory.
    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a directory with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &mut self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<MonoidCacheConfig, ConfigError> {
        let mut config = MonoidCacheConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a single explicit config file on top of the defaults.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<MonoidCacheConfig, ConfigError> {
        debug!("Loading config from {:?}", path);
        let mut config = merge_configs(MonoidCacheConfig::default(), load_config_file(path)?);
        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<MonoidCacheConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a directory.
    pub fn load_local(&self, root: &Path) -> Result<Option<MonoidCacheConfig>, ConfigError> {
        let local_path = self.local_config_path(root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &MonoidCacheConfig) -> Result<PathBuf, ConfigError> {
        let path = self.global_config_path().ok_or(ConfigError::NoHomeDir)?;
        save_config_file(&path, config)?;
        Ok(path)
    }

    /// Save configuration to the local config file for a directory.
    pub fn save_local(
        &self,
        root: &Path,
        config: &MonoidCacheConfig,
    ) -> Result<PathBuf, ConfigError> {
        let path = self.local_config_path(root);
        save_config_file(&path, config)?;
        Ok(path)
    }

    /// Create the global config file with defaults if it does not exist.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let path = self.global_config_path().ok_or(ConfigError::NoHomeDir)?;
        init_config_file(&path)?;
        Ok(path)
    }

    /// Create the local config file with defaults if it does not exist.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        let path = self.local_config_path(root);
        init_config_file(&path)?;
        Ok(path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<MonoidCacheConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &MonoidCacheConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

fn init_config_file(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        trace!("Config already exists at {:?}", path);
        return Ok(());
    }
    save_config_file(path, &MonoidCacheConfig::default())
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs.
fn merge_configs(base: MonoidCacheConfig, overlay: MonoidCacheConfig) -> MonoidCacheConfig {
    MonoidCacheConfig {
        cache: merge_cache(base.cache, overlay.cache),
        policies: merge_policies(base.policies, overlay.policies),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

/// Merge cache settings; overlay values that differ from the defaults win.
fn merge_cache(base: CacheSettings, overlay: CacheSettings) -> CacheSettings {
    CacheSettings {
        max_snapshots: if overlay.max_snapshots != DEFAULT_MAX_SNAPSHOTS {
            overlay.max_snapshots
        } else {
            base.max_snapshots
        },
        max_window_end: if overlay.max_window_end != DEFAULT_MAX_WINDOW_END {
            overlay.max_window_end
        } else {
            base.max_window_end
        },
    }
}

/// Merge policy lists; an overlay entry replaces a base entry for the same type and field.
fn merge_policies(base: Vec<PolicyConfig>, overlay: Vec<PolicyConfig>) -> Vec<PolicyConfig> {
    let mut policies = base;
    for policy in overlay {
        match policies
            .iter_mut()
            .find(|p| p.type_name == policy.type_name && p.field == policy.field)
        {
            Some(existing) => *existing = policy,
            None => policies.push(policy),
        }
    }
    policies
}

/// Merge logging config.
fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
        format: if overlay.format != LogFormat::Text {
            overlay.format
        } else {
            base.format
        },
    }
}
