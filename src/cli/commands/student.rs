//! Student CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::commands::open_engine;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, StudentProfile};

/// Arguments for `folio student`.
#[derive(Args, Debug)]
pub struct StudentArgs {
    #[command(subcommand)]
    pub command: StudentCommands,
}

/// Student profile subcommands.
#[derive(Subcommand, Debug)]
pub enum StudentCommands {
    /// Register a student profile
    Add {
        /// Display name
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        school: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct StudentOutput {
    pub success: bool,
    pub student: StudentProfile,
}

impl CommandOutput for StudentOutput {
    fn to_human(&self) -> String {
        format!("Student registered: {} ({})", self.student.name, self.student.id)
    }
}

/// Run a student subcommand.
pub async fn execute(args: StudentArgs, config: &Config, json_mode: bool) -> Result<()> {
    let StudentCommands::Add {
        name,
        email,
        phone,
        school,
        city,
    } = args.command;

    let mut profile = StudentProfile::new(name);
    profile.email = email;
    profile.phone = phone;
    profile.school = school;
    profile.city = city;

    let engine = open_engine(config).await?;
    let result = engine.portfolios.register_student(profile).await;
    engine.shutdown().await;

    output(&StudentOutput { success: true, student: result? }, json_mode);
    Ok(())
}
