//! Monoid Cache Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.monoid-cache/config.toml`
//! - Local config: `.monoid-cache/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use monoid_cache_core::{DEFAULT_MAX_SNAPSHOTS, DEFAULT_MAX_WINDOW_END};

use monoid_cache_core::{CacheError, FieldPolicy};
use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MonoidCacheConfig {
    /// Snapshot store limits
    pub cache: CacheSettings,

    /// Field policies registered on top of the console defaults
    pub policies: Vec<PolicyConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Snapshot store limits.
///
/// # Example TOML
///
/// ```toml
/// [cache]
/// max_snapshots = 4096
/// max_window_end = 1000000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of snapshots held before LRU eviction
    pub max_snapshots: usize,

    /// Maximum end position (offset + page length) a merge may reach
    pub max_window_end: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            max_window_end: DEFAULT_MAX_WINDOW_END,
        }
    }
}

/// An additional paginated field policy.
///
/// # Example TOML
///
/// ```toml
/// [[policies]]
/// type = "Workspace"
/// field = "silos"
/// field_name = "siloDefinitions"
/// count_name = "numSilos"
/// key_args = ["query"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Type owning the field
    #[serde(rename = "type")]
    pub type_name: String,

    /// GraphQL field name
    pub field: String,

    /// Response property holding the items
    pub field_name: String,

    /// Response property holding the total count
    pub count_name: String,

    /// Arguments partitioning the cache
    #[serde(default)]
    pub key_args: Vec<String>,
}

impl PolicyConfig {
    /// The field policy this entry describes.
    pub fn to_field_policy(&self) -> FieldPolicy {
        FieldPolicy::paginated(
            self.field_name.clone(),
            self.count_name.clone(),
            self.key_args.iter().cloned(),
        )
    }

    /// Validate one policy entry with the same rules the cache applies at
    /// registration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.type_name.is_empty() || self.field.is_empty() {
            return Err(ConfigError::invalid_policy(
                &self.type_name,
                &self.field,
                "type and field must not be empty",
            ));
        }
        self.to_field_policy()
            .validate(&self.type_name, &self.field)
            .map_err(|err| match err {
                CacheError::InvalidPolicy { message, .. } => {
                    ConfigError::invalid_policy(&self.type_name, &self.field, message)
                }
                other => ConfigError::invalid_policy(&self.type_name, &self.field, other.to_string()),
            })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::invalid_value(
                "logging.format",
                format!("unknown log format '{}'. Valid values: text, json", s),
            )),
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override snapshot bound
    pub max_snapshots: Option<usize>,

    /// Override window end bound
    pub max_window_end: Option<usize>,

    /// Override log level
    pub log_level: Option<String>,

    /// Override log format
    pub log_format: Option<LogFormat>,
}

impl MonoidCacheConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(max) = overrides.max_snapshots {
            self.cache.max_snapshots = max;
        }

        if let Some(max) = overrides.max_window_end {
            self.cache.max_window_end = max;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }

        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_snapshots == 0 {
            return Err(ConfigError::invalid_value(
                "cache.max_snapshots",
                "must be greater than 0",
            ));
        }
        if self.cache.max_window_end == 0 {
            return Err(ConfigError::invalid_value(
                "cache.max_window_end",
                "must be greater than 0",
            ));
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        for policy in &self.policies {
            policy.validate()?;
        }
        Ok(())
    }
}
