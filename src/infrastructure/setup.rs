//! Project initialization: the `.folio/` directory, its default config
//! file and a migrated database.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::sqlite::{database_url, initialize_database};

/// Default configuration template content
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Folio configuration
# Override settings by editing this file, adding .folio/local.yaml, or
# setting environment variables with the FOLIO_ prefix, for example:
#   export FOLIO_DATABASE__PATH=/custom/path/folio.db
#   export FOLIO_LOGGING__LEVEL=debug
#   export FOLIO_RATING__OLYMPIADS=25

database:
  # Path to SQLite database file (project-local)
  path: ".folio/folio.db"
  max_connections: 5

logging:
  # trace, debug, info, warn, error
  level: "info"
  # json or pretty
  format: "pretty"

events:
  channel_capacity: 256
  # Reactions chained beyond this depth are dropped
  max_chain_depth: 4
  handler_timeout_ms: 5000

verification:
  # Verify blocks that reference the student's own platform evidence
  auto_verify: true

# Rating component weights; the score is normalized by their total
rating:
  ils_level: 30
  verification: 25
  olympiads: 20
  assessments: 15
  content: 10
"#;

/// Setup paths and directories
pub struct SetupPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
}

impl SetupPaths {
    /// Get setup paths for the current directory
    pub fn new() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::in_dir(&current_dir))
    }

    pub fn in_dir(root: &Path) -> Self {
        let config_dir = root.join(".folio");
        Self {
            config_file: config_dir.join("config.yaml"),
            database_file: config_dir.join("folio.db"),
            config_dir,
        }
    }

    /// Check if the project is already initialized
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists() && self.database_file.exists()
    }
}

/// Create the configuration directory
pub fn create_config_dir(paths: &SetupPaths) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).context("Failed to create config directory")
}

/// Write the default configuration file unless one exists.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<()> {
    if paths.config_file.exists() && !force {
        return Ok(());
    }
    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")
}

/// Create the database if needed and apply pending migrations. Safe to
/// run against an existing database.
pub async fn run_migrations(paths: &SetupPaths) -> Result<()> {
    let url = database_url(&paths.database_file.to_string_lossy());
    let pool = initialize_database(&url, None)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;
    Ok(())
}

/// Full project initialization.
pub async fn initialize_project(paths: &SetupPaths, force: bool) -> Result<()> {
    create_config_dir(paths)?;
    create_config_file(paths, force)?;
    run_migrations(paths).await?;
    tracing::info!(config_dir = %paths.config_dir.display(), "project initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Config;

    #[tokio::test]
    async fn test_initialize_project() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SetupPaths::in_dir(dir.path());
        assert!(!paths.is_initialized());

        initialize_project(&paths, false).await.unwrap();
        assert!(paths.is_initialized());

        // Re-running keeps a customized config and an existing database.
        fs::write(&paths.config_file, "logging:\n  level: debug\n").unwrap();
        initialize_project(&paths, false).await.unwrap();
        assert!(fs::read_to_string(&paths.config_file).unwrap().contains("debug"));
    }

    #[test]
    fn test_default_template_is_valid_config() {
        let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        crate::infrastructure::config::ConfigLoader::validate(&config).unwrap();
        assert_eq!(config.database.path, ".folio/folio.db");
    }
}
