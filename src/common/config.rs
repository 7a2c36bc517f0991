//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Default reporter behaviour
    #[serde(default)]
    pub defaults: Defaults,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Terminal output settings
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Default settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Skip the initial break when the run starts
    #[serde(default)]
    pub continue_on_start: bool,

    /// Take over Ctrl+C so it breaks the run instead of killing it
    #[serde(default = "default_hijack_interrupt")]
    pub hijack_interrupt: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            continue_on_start: false,
            hijack_interrupt: default_hijack_interrupt(),
        }
    }
}

fn default_hijack_interrupt() -> bool {
    true
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// How long to wait for the host to confirm a pause or resume
    #[serde(default = "default_host_transition")]
    pub host_transition_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            host_transition_secs: default_host_transition(),
        }
    }
}

fn default_host_transition() -> u64 {
    30
}

/// Terminal output settings
#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    /// Colorize menu and tables
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
        }
    }
}

fn default_color() -> bool {
    true
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.defaults.continue_on_start);
        assert!(config.defaults.hijack_interrupt);
        assert_eq!(config.timeouts.host_transition_secs, 30);
        assert!(config.display.color);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ncontinue_on_start = true\n\n[timeouts]\nhost_transition_secs = 5").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert!(config.defaults.continue_on_start);
        assert!(config.defaults.hijack_interrupt);
        assert_eq!(config.timeouts.host_transition_secs, 5);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults\ncontinue_on_start = ").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }
}
