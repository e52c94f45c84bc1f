//! Configuration management
//!
//! Loads and saves configuration from XDG-compliant paths.
//! Config location: ~/.config/station-finder/config.toml

pub mod defaults;

use crate::error::{Error, Result};
use crate::feed::FeedSettings;
use crate::store::JsonFileTable;
use defaults::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Position feed settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Station search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Result storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Position feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Source subscribed when none is named
    #[serde(default = "default_source")]
    pub default_source: String,

    /// Minimum time between position updates
    #[serde(default = "default_min_time")]
    pub min_time_between_updates_millis: u64,

    /// Minimum distance between position updates
    #[serde(default = "default_min_distance")]
    pub min_distance_between_updates_meters: u32,

    /// Whether location permission is granted
    #[serde(default = "default_true")]
    pub permission_granted: bool,
}

/// Station search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// GraphQL endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Maximum number of stations per position search
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Radius used when none is given
    #[serde(default = "default_radius")]
    pub default_radius_meters: u32,

    /// Search call timeout; 0 disables it
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Result storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Stations file; empty means the XDG data directory
    #[serde(default)]
    pub stations_file: String,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format
    #[serde(default = "default_format")]
    pub format: String,
}

// Default value functions for serde
fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}
fn default_min_time() -> u64 {
    DEFAULT_MIN_TIME_BETWEEN_UPDATES_MILLIS
}
fn default_min_distance() -> u32 {
    DEFAULT_MIN_DISTANCE_BETWEEN_UPDATES_METERS
}
fn default_true() -> bool {
    true
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}
fn default_radius() -> u32 {
    DEFAULT_RADIUS_METERS
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_source: default_source(),
            min_time_between_updates_millis: default_min_time(),
            min_distance_between_updates_meters: default_min_distance(),
            permission_granted: default_true(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_results: default_max_results(),
            default_radius_meters: default_radius(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, value)))
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(APP_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default path
    ///
    /// Creates default config if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, creating it with defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read config file: {}", e))
            })?;

            toml::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse config file: {}", e))
            })
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            Error::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content).map_err(|e| {
            Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Get a configuration value by key path
    ///
    /// Key format: "section.key"
    /// Returns the value as a string, or None if not found
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["location", "default_source"] => Some(self.location.default_source.clone()),
            ["location", "min_time_between_updates_millis"] => {
                Some(self.location.min_time_between_updates_millis.to_string())
            }
            ["location", "min_distance_between_updates_meters"] => {
                Some(self.location.min_distance_between_updates_meters.to_string())
            }
            ["location", "permission_granted"] => {
                Some(self.location.permission_granted.to_string())
            }

            ["search", "endpoint"] => Some(self.search.endpoint.clone()),
            ["search", "max_results"] => Some(self.search.max_results.to_string()),
            ["search", "default_radius_meters"] => {
                Some(self.search.default_radius_meters.to_string())
            }
            ["search", "timeout_secs"] => Some(self.search.timeout_secs.to_string()),

            ["storage", "stations_file"] => Some(self.storage.stations_file.clone()),

            ["output", "format"] => Some(self.output.format.clone()),

            _ => None,
        }
    }

    /// Set a configuration value by key path
    ///
    /// Key format: "section.key"
    /// Returns error if key is invalid or value type is wrong
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["location", "default_source"] => {
                if value.is_empty() {
                    return Err(Error::Config("Source name cannot be empty".to_string()));
                }
                self.location.default_source = value.to_string();
            }
            ["location", "min_time_between_updates_millis"] => {
                self.location.min_time_between_updates_millis = parse_value(key, value)?;
            }
            ["location", "min_distance_between_updates_meters"] => {
                self.location.min_distance_between_updates_meters = parse_value(key, value)?;
            }
            ["location", "permission_granted"] => {
                self.location.permission_granted = parse_value(key, value)?;
            }

            ["search", "endpoint"] => {
                self.search.endpoint = value.to_string();
            }
            ["search", "max_results"] => {
                self.search.max_results = parse_value(key, value)?;
            }
            ["search", "default_radius_meters"] => {
                let radius: u32 = parse_value(key, value)?;
                if radius == 0 {
                    return Err(Error::InvalidRadius("radius must be positive".to_string()));
                }
                self.search.default_radius_meters = radius;
            }
            ["search", "timeout_secs"] => {
                self.search.timeout_secs = parse_value(key, value)?;
            }

            ["storage", "stations_file"] => {
                self.storage.stations_file = value.to_string();
            }

            ["output", "format"] => {
                if crate::format::get_formatter(value).is_none() {
                    return Err(Error::Config(format!("Unknown format: {}", value)));
                }
                self.output.format = value.to_lowercase();
            }

            _ => {
                return Err(Error::Config(format!("Unknown config key: {}", key)));
            }
        }

        Ok(())
    }

    /// List all available config keys
    pub fn available_keys() -> Vec<&'static str> {
        vec![
            "location.default_source",
            "location.min_time_between_updates_millis",
            "location.min_distance_between_updates_meters",
            "location.permission_granted",
            "search.endpoint",
            "search.max_results",
            "search.default_radius_meters",
            "search.timeout_secs",
            "storage.stations_file",
            "output.format",
        ]
    }

    /// Position feed settings derived from the `[location]` section
    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            default_source: self.location.default_source.clone(),
            min_time_between_updates_millis: self.location.min_time_between_updates_millis,
            min_distance_between_updates_meters: self.location.min_distance_between_updates_meters,
        }
    }

    /// Search call timeout, if enabled
    pub fn search_timeout(&self) -> Option<Duration> {
        match self.search.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Stations file path
    pub fn stations_path(&self) -> Result<PathBuf> {
        if self.storage.stations_file.is_empty() {
            JsonFileTable::default_path()
        } else {
            Ok(PathBuf::from(&self.storage.stations_file))
        }
    }
}
