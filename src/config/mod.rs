//! Configuration management for Clipbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `CLIPBOX__<section>__<key>`
//!
//! Examples:
//! - `CLIPBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `CLIPBOX__EXTRACTOR__BINARY=/opt/yt-dlp/yt-dlp`
//! - `CLIPBOX__EXTRACTOR__DOWNLOADS_DIR=/srv/media`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/clipbox.toml`.
//! This can be overridden using the `CLIPBOX_CONFIG` environment variable.

mod models;
mod sources;

pub use models::{Config, ExtractorConfig, ServerConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails (blank binary, empty extension allow-list).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.extractor.binary.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "extractor.binary must not be blank".to_string(),
        ));
    }
    if config.extractor.allowed_exts.is_empty() {
        return Err(ConfigError::ValidationError(
            "extractor.allowed_exts must list at least one extension".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[extractor]
binary = "yt-dlp"
allowed_exts = ["mp4", "webm"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.extractor.allowed_exts, vec!["mp4", "webm"]);
    }

    #[test]
    fn test_validation_catches_empty_allow_list() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[extractor]\nallowed_exts = []\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_catches_blank_binary() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[extractor]\nbinary = \"  \"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
