//! CLI Configuration.
//!
//! Configuration management for the `dusd` tool: protocol parameters plus
//! output settings, loaded from a JSON file and overridden by `DUSD_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::output::OutputFormat;
use crate::core::config::ProtocolParams;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Protocol parameters used for scenario runs
    pub params: ProtocolParams,
    /// Output format
    pub format: OutputFormat,
    /// Colored output
    pub color: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            params: ProtocolParams::default(),
            format: OutputFormat::Text,
            color: true,
        }
    }
}

impl CliConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
            }
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Apply `DUSD_*` environment overrides
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("DUSD_AUTO_SYNC") {
            self.params.auto_sync = parse_var("DUSD_AUTO_SYNC", &value)?;
        }

        if let Some(value) = lookup("DUSD_MAX_PRICE_AGE") {
            self.params.max_price_age_secs = parse_var("DUSD_MAX_PRICE_AGE", &value)?;
        }

        if let Some(value) = lookup("DUSD_SNAPSHOT_TOLERANCE") {
            self.params.snapshot_tolerance_secs = parse_var("DUSD_SNAPSHOT_TOLERANCE", &value)?;
        }

        if let Some(value) = lookup("DUSD_MINT_FEE_BPS") {
            self.params.mint_fee_bps = parse_var("DUSD_MINT_FEE_BPS", &value)?;
        }

        if let Some(value) = lookup("DUSD_REDEEM_FEE_BPS") {
            self.params.redeem_fee_bps = parse_var("DUSD_REDEEM_FEE_BPS", &value)?;
        }

        if let Some(value) = lookup("DUSD_OUTPUT") {
            self.format = value.parse().map_err(ConfigError::Validation)?;
        }

        Ok(self)
    }

    /// Load the file if given, then apply environment overrides
    pub fn resolve(path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = base.with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{} has invalid value '{}'", key, value)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = CliConfig::default();
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dusd.json");

        let mut config = CliConfig::default();
        config.params.auto_sync = false;
        config.format = OutputFormat::Json;
        config.save(&path).unwrap();

        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DUSD_AUTO_SYNC", "false"),
            ("DUSD_SNAPSHOT_TOLERANCE", "30"),
            ("DUSD_REDEEM_FEE_BPS", "25"),
            ("DUSD_OUTPUT", "json"),
        ]
        .into_iter()
        .collect();

        let config = CliConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(!config.params.auto_sync);
        assert_eq!(config.params.snapshot_tolerance_secs, 30);
        assert_eq!(config.params.redeem_fee_bps, 25);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_bad_env_value() {
        let result = CliConfig::default().with_overrides(|k| (k == "DUSD_MAX_PRICE_AGE").then(|| "soon".to_string()));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CliConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = CliConfig::default();
        config.params.max_events = 0;
        assert!(config.validate().is_err());
    }
}
