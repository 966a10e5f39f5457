//! Configuration loading and book-file resolution

use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::taxonomy::Taxonomy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the book file
pub const BOOK_ENV_VAR: &str = "LARDER_BOOK";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LARDER_CONFIG";

/// Bootstrap configuration read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Recipe book file; OS default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_file: Option<PathBuf>,

    /// Alternative taxonomy JSON; built-in tables when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_file: Option<PathBuf>,

    pub planning: PlanningConfig,
    pub logging: LoggingConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Number of days, starting today, the calendar keeps ready
    pub window_days: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self { window_days: 14 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file; stderr when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Store event channel capacity
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl TomlConfig {
    /// Parse a config file; fails if it is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse a config file, falling back to defaults when it does not exist
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid logging level '{}'",
                self.logging.level
            )));
        }
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Taxonomy named by `taxonomy_file`, or the built-in set
    pub fn load_taxonomy(&self) -> Result<Taxonomy> {
        match &self.taxonomy_file {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Cannot read taxonomy {}: {}", path.display(), e))
                })?;
                Taxonomy::from_json(&json)
            }
            None => Ok(Taxonomy::builtin()),
        }
    }
}

/// OS default config file: `<config_dir>/larder/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("larder").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("larder.toml"))
}

/// OS default book file: `<data_local_dir>/larder/recipes.json`
pub fn default_book_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("larder").join("recipes.json"))
        .unwrap_or_else(|| PathBuf::from("recipes.json"))
}

/// Config file resolution:
/// 1. Command-line argument
/// 2. `LARDER_CONFIG`
/// 3. OS default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    default_config_path()
}

/// Book file resolution:
/// 1. Command-line argument
/// 2. `LARDER_BOOK`
/// 3. `book_file` from the TOML config
/// 4. OS default
pub fn resolve_book_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(BOOK_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(path) = &config.book_file {
        return path.clone();
    }
    default_book_path()
}

/// Write a config file atomically (temporary file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Cannot encode configuration: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    std::fs::write(&temp, content)?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }
    debug!(path = %path.display(), "Configuration written");
    Ok(())
}
