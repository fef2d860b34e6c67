//! Engine configuration model.

use serde::{Deserialize, Serialize};

/// Main configuration structure for folio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reaction dispatcher configuration
    #[serde(default)]
    pub events: EventsConfig,

    /// Verification behaviour
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Rating weights
    #[serde(default)]
    pub rating: RatingWeights,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".folio/folio.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Event bus and reactor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventsConfig {
    /// Broadcast channel capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Maximum reaction chain depth per correlation id
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: u32,

    /// Per-handler timeout in milliseconds
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
}

const fn default_channel_capacity() -> usize {
    256
}

const fn default_max_chain_depth() -> u32 {
    4
}

const fn default_handler_timeout_ms() -> u64 {
    5000
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_chain_depth: default_max_chain_depth(),
            handler_timeout_ms: default_handler_timeout_ms(),
        }
    }
}

/// Verification behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VerificationConfig {
    /// Verify blocks automatically when they reference known evidence
    #[serde(default = "default_true")]
    pub auto_verify: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            auto_verify: default_true(),
        }
    }
}

/// Weights of the rating components. The score is normalized by their total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RatingWeights {
    #[serde(default = "default_ils_weight")]
    pub ils_level: f64,
    #[serde(default = "default_verification_weight")]
    pub verification: f64,
    #[serde(default = "default_olympiad_weight")]
    pub olympiads: f64,
    #[serde(default = "default_assessment_weight")]
    pub assessments: f64,
    #[serde(default = "default_content_weight")]
    pub content: f64,
}

const fn default_ils_weight() -> f64 {
    30.0
}

const fn default_verification_weight() -> f64 {
    25.0
}

const fn default_olympiad_weight() -> f64 {
    20.0
}

const fn default_assessment_weight() -> f64 {
    15.0
}

const fn default_content_weight() -> f64 {
    10.0
}

impl RatingWeights {
    pub fn total(&self) -> f64 {
        self.ils_level + self.verification + self.olympiads + self.assessments + self.content
    }
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            ils_level: default_ils_weight(),
            verification: default_verification_weight(),
            olympiads: default_olympiad_weight(),
            assessments: default_assessment_weight(),
            content: default_content_weight(),
        }
    }
}
