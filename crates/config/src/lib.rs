//! Configuration loading, validation, and management for Proctor.
//!
//! Loads configuration from `~/.proctor/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.proctor/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shared assembly state (form rotation, field-test counters)
    #[serde(default)]
    pub cache: CacheConfig,

    /// Assembly behavior
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Segment persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Default fixture for `proctor assemble`
    #[serde(default)]
    pub fixtures: FixturesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hours a segment's rotation or counter state may sit idle before it
    /// is forgotten.
    #[serde(default = "default_idle_ttl_hours")]
    pub idle_ttl_hours: i64,
}

fn default_idle_ttl_hours() -> i64 {
    24
}

/// Longest accepted idle window: one year.
pub const MAX_IDLE_TTL_HOURS: i64 = 24 * 366;

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_ttl_hours: default_idle_ttl_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Accommodation type whose code selects the exam language
    #[serde(default = "default_language_accommodation_type")]
    pub language_accommodation_type: String,
}

fn default_language_accommodation_type() -> String {
    "Language".into()
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            language_accommodation_type: default_language_accommodation_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSONL segment log. Unset keeps assembly output in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixturesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl AppConfig {
    /// Load configuration from the default path (~/.proctor/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `PROCTOR_LOG_LEVEL`
    /// - `PROCTOR_CACHE_TTL_HOURS`
    /// - `PROCTOR_FIXTURE`
    /// - `PROCTOR_STORE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, then re-validate.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(level) = lookup("PROCTOR_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(hours) = lookup("PROCTOR_CACHE_TTL_HOURS") {
            self.cache.idle_ttl_hours = hours.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("PROCTOR_CACHE_TTL_HOURS is not a number: {hours}"))
            })?;
        }

        if let Some(fixture) = lookup("PROCTOR_FIXTURE") {
            self.fixtures.path = Some(PathBuf::from(fixture));
        }

        if let Some(store) = lookup("PROCTOR_STORE") {
            self.store.path = Some(PathBuf::from(store));
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".proctor")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.idle_ttl_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "cache.idle_ttl_hours must be > 0".into(),
            ));
        }
        if self.cache.idle_ttl_hours > MAX_IDLE_TTL_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "cache.idle_ttl_hours must be at most {MAX_IDLE_TTL_HOURS}, got {}",
                self.cache.idle_ttl_hours
            )));
        }

        if self.assembly.language_accommodation_type.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "assembly.language_accommodation_type must not be empty".into(),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
