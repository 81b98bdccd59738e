//! Configuration file handling.
//!
//! This module provides loading and saving of techsweep configuration
//! from a TOML file. Command-line flags override every value.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/techsweep/config.toml`
//! - macOS: `~/Library/Application Support/techsweep/config.toml`
//! - Windows: `%APPDATA%\techsweep\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! default_format = "xlsx"
//! workers = 5
//! timeout_secs = 500
//! backend = "auto"
//! command = "docker run --rm wappalyzer/cli"
//! command_args = "--pretty --probe"
//! keep_empty = true
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::analyzer::Backend;

/// Default analyzer command; the target URL is appended to it.
pub const DEFAULT_COMMAND: &str = "docker run --rm wappalyzer/cli";

/// Default arguments placed after the target URL.
pub const DEFAULT_COMMAND_ARGS: &str = "--pretty --probe --user-agent=\"Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.83 Safari/537.36\"";

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use techsweep::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Workers: {}", config.workers);
/// println!("Timeout: {}s", config.timeout_secs);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output format when no `--format` flag is provided.
    ///
    /// Valid values: "xlsx", "csv", "json"
    /// Default: "xlsx"
    pub default_format: String,

    /// Number of targets analyzed at the same time.
    ///
    /// Default: 5
    pub workers: usize,

    /// Per-target timeout, in seconds.
    ///
    /// Default: 500
    pub timeout_secs: u64,

    /// Analyzer backend.
    ///
    /// Default: auto
    pub backend: Backend,

    /// Analyzer command line used by the command backend.
    pub command: String,

    /// Arguments appended after the target URL.
    pub command_args: String,

    /// Whether targets where nothing was detected still get a row.
    ///
    /// Default: true
    pub keep_empty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_format: "xlsx".to_string(),
            workers: 5,
            timeout_secs: 500,
            backend: Backend::Auto,
            command: DEFAULT_COMMAND.to_string(),
            command_args: DEFAULT_COMMAND_ARGS.to_string(),
            keep_empty: true,
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text; missing keys take defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("techsweep")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn generate_default_config() -> Result<String> {
        let config = Config::default();
        Ok(toml::to_string_pretty(&config)?)
    }
}
