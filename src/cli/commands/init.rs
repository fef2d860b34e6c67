//! Implementation of the `folio init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::setup::{initialize_project, SetupPaths};

/// Arguments for `folio init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        if !self.success {
            return self.message.clone();
        }
        format!(
            "{}\n\nConfiguration: {}\nDatabase:      {}",
            self.message,
            self.config_file.display(),
            self.database_file.display()
        )
    }
}

/// Create `.folio/` with a default config and a migrated database.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };
    let paths = SetupPaths::in_dir(&target_path);

    if paths.is_initialized() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to rewrite the configuration.".to_string(),
            config_file: paths.config_file,
            database_file: paths.database_file,
        };
        output(&out, json_mode);
        return Ok(());
    }

    initialize_project(&paths, args.force).await?;

    let out = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        config_file: paths.config_file,
        database_file: paths.database_file,
    };
    output(&out, json_mode);
    Ok(())
}
