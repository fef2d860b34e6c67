//! Command line surface of the `folio` binary.

pub mod commands;
pub mod id_resolver;
pub mod output;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::domain::errors::{DomainError, ErrorKind};
use crate::domain::models::{Actor, ActorType};

use commands::{
    block::BlockArgs, evidence::EvidenceArgs, init::InitArgs, portfolio::PortfolioArgs, student::StudentArgs,
    verify::VerifyArgs,
};

/// Top-level command line.
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio - student portfolio content and verification engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Command groups.
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize folio configuration and database
    Init(InitArgs),
    /// Portfolio lifecycle commands
    Portfolio(PortfolioArgs),
    /// Content block commands
    Block(BlockArgs),
    /// Verification workflow commands
    Verify(VerifyArgs),
    /// Evidence records backing auto-verification and ratings
    Evidence(EvidenceArgs),
    /// Student profile commands
    Student(StudentArgs),
}

/// Identity a command acts as.
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    /// Acting identity (a student id, an admin or checker name)
    #[arg(long = "as", global = true)]
    pub actor: Option<String>,

    /// Role of the acting identity (student, admin, external)
    #[arg(long, global = true, default_value = "student")]
    pub role: String,
}

impl ActorArgs {
    fn actor_type(&self) -> anyhow::Result<ActorType> {
        match ActorType::from_str(&self.role) {
            Some(ActorType::System) | None => Err(anyhow::anyhow!("Invalid role: {}", self.role)),
            Some(actor_type) => Ok(actor_type),
        }
    }

    /// The acting identity; mutations require one.
    pub fn actor(&self) -> anyhow::Result<Actor> {
        let actor_type = self.actor_type()?;
        let id = self
            .actor
            .clone()
            .ok_or_else(|| anyhow::anyhow!("This command needs an identity: pass --as <ID>"))?;
        Ok(Actor::new(id, actor_type))
    }

    /// The viewer for read commands; `None` reads anonymously.
    pub fn viewer(&self) -> anyhow::Result<Option<Actor>> {
        let actor_type = self.actor_type()?;
        Ok(self.actor.clone().map(|id| Actor::new(id, actor_type)))
    }
}

/// Exit status for a failed command, by error kind.
pub fn exit_code(kind: Option<ErrorKind>) -> i32 {
    match kind {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::InvalidTransition) => 5,
        Some(ErrorKind::Forbidden) => 6,
        Some(ErrorKind::Internal) | None => 1,
    }
}

/// Report a failed command and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = err.downcast_ref::<DomainError>().map(DomainError::kind);
    if json_mode {
        let body = json!({
            "success": false,
            "error": {
                "kind": kind.map_or("internal", |k| k.as_str()),
                "message": format!("{err:#}"),
            }
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(exit_code(kind))
}
