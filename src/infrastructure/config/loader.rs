//! Layered configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid channel_capacity: {0}. Must be at least 1")]
    InvalidChannelCapacity(usize),

    #[error("Invalid max_chain_depth: {0}. Must be between 1 and 32")]
    InvalidChainDepth(u32),

    #[error("Invalid handler_timeout_ms: {0}. Must be at least 1")]
    InvalidHandlerTimeout(u64),

    #[error("Invalid rating weight {name}: {value}. Weights must be finite and non-negative")]
    InvalidRatingWeight { name: &'static str, value: f64 },

    #[error("Rating weights sum to zero")]
    ZeroRatingWeights,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .folio/config.yaml (project config, created by init)
    /// 3. .folio/local.yaml (project local overrides, optional)
    /// 4. Environment variables (FOLIO_* prefix, `__` between nesting levels)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".folio")
    }

    /// Same as [`ConfigLoader::load`] with the project directory given explicitly.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Self::figment()
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("FOLIO_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Self::figment()
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.events.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity(config.events.channel_capacity));
        }

        if !(1..=32).contains(&config.events.max_chain_depth) {
            return Err(ConfigError::InvalidChainDepth(config.events.max_chain_depth));
        }

        if config.events.handler_timeout_ms == 0 {
            return Err(ConfigError::InvalidHandlerTimeout(config.events.handler_timeout_ms));
        }

        let weights = &config.rating;
        for (name, value) in [
            ("ils_level", weights.ils_level),
            ("verification", weights.verification),
            ("olympiads", weights.olympiads),
            ("assessments", weights.assessments),
            ("content", weights.content),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidRatingWeight { name, value });
            }
        }
        if weights.total() <= 0.0 {
            return Err(ConfigError::ZeroRatingWeights);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".folio/folio.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.events.max_chain_depth, 4);
        assert!(config.verification.auto_verify);
        assert!((config.rating.total() - 100.0).abs() < f64::EPSILON);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
events:
  max_chain_depth: 2
verification:
  auto_verify: false
rating:
  content: 0
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.events.max_chain_depth, 2);
        assert_eq!(config.events.channel_capacity, 256);
        assert!(!config.verification.auto_verify);
        assert!(config.rating.content.abs() < f64::EPSILON);
        assert!((config.rating.ils_level - 30.0).abs() < f64::EPSILON);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(ref f) if f == "xml"
        ));
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config).unwrap_err(), ConfigError::EmptyDatabasePath));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_reactor_limits() {
        let mut config = Config::default();
        config.events.max_chain_depth = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidChainDepth(0)
        ));

        let mut config = Config::default();
        config.events.handler_timeout_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidHandlerTimeout(0)
        ));
    }

    #[test]
    fn test_validate_rating_weights() {
        let mut config = Config::default();
        config.rating.olympiads = -1.0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidRatingWeight { name: "olympiads", .. }
        ));

        config.rating = crate::domain::models::RatingWeights {
            ils_level: 0.0,
            verification: 0.0,
            olympiads: 0.0,
            assessments: 0.0,
            content: 0.0,
        };
        assert!(matches!(ConfigLoader::validate(&config).unwrap_err(), ConfigError::ZeroRatingWeights));
    }

    #[test]
    fn test_hierarchical_merging_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "logging:\n  level: info\n  format: json\ndatabase:\n  path: base.db\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        let config = temp_env::with_vars(
            [
                ("FOLIO_DATABASE__PATH", Some("env.db")),
                ("FOLIO_EVENTS__MAX_CHAIN_DEPTH", Some("3")),
            ],
            || ConfigLoader::load_from_dir(dir.path()).unwrap(),
        );

        assert_eq!(config.logging.level, "debug", "local.yaml should win over config.yaml");
        assert_eq!(config.logging.format, "json", "base value should persist when not overridden");
        assert_eq!(config.database.path, "env.db", "environment should win over files");
        assert_eq!(config.events.max_chain_depth, 3);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_env::with_vars_unset(["FOLIO_DATABASE__PATH", "FOLIO_LOGGING__LEVEL"], || {
            ConfigLoader::load_from_dir(dir.path()).unwrap()
        });
        assert_eq!(config.database.path, ".folio/folio.db");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "logging:\n  format: xml\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}
