//! Verification CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::application::Engine;
use crate::cli::commands::block::{block_action, BlockListOutput};
use crate::cli::commands::open_engine;
use crate::cli::id_resolver::resolve_portfolio_id;
use crate::cli::output::{output, short_id, truncate, CommandOutput};
use crate::cli::ActorArgs;
use crate::domain::models::{Config, VerificationLogEntry};
use crate::services::QueueEntry;

/// Arguments for `folio verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(subcommand)]
    pub command: VerifyCommands,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Verification workflow subcommands.
#[derive(Subcommand, Debug)]
pub enum VerifyCommands {
    /// Request review of one block, or of every eligible block
    Request {
        /// Portfolio id or slug
        portfolio: String,
        /// Block id; omit to request the whole portfolio
        block: Option<String>,
        /// Note for the reviewer
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Approve a block, or every pending block
    Approve {
        /// Portfolio id or slug
        portfolio: String,
        /// Block id; omit to approve the whole portfolio
        block: Option<String>,
        /// Reviewer note
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Reject a block, or every pending block
    Reject {
        /// Portfolio id or slug
        portfolio: String,
        /// Block id; omit to reject the whole portfolio
        block: Option<String>,
        /// Reason shown to the student
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Audit history, newest first
    History {
        /// Portfolio id or slug
        portfolio: String,
        /// Restrict to one block (deleted blocks included)
        #[arg(short, long)]
        block: Option<String>,
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Portfolios with blocks awaiting review
    Queue,
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryOutput {
    pub entries: Vec<VerificationLogEntry>,
    pub total: usize,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No verification history.".to_string();
        }
        let mut lines = vec![format!(
            "{:<20} {:<20} {:<12} {:<18}",
            "TIMESTAMP", "BLOCK", "ACTION", "ACTOR"
        )];
        lines.push("-".repeat(72));
        for entry in &self.entries {
            let actor = entry.actor_id.as_deref().unwrap_or(entry.actor_type.as_str());
            lines.push(format!(
                "{:<20} {:<20} {:<12} {:<18}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                truncate(&entry.block_id, 18),
                entry.action.as_str(),
                truncate(actor, 16)
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct QueueOutput {
    pub portfolios: Vec<QueueEntry>,
    pub total: usize,
}

impl CommandOutput for QueueOutput {
    fn to_human(&self) -> String {
        if self.portfolios.is_empty() {
            return "Nothing awaiting review.".to_string();
        }
        let mut lines = vec![format!("{} portfolio(s) awaiting review:\n", self.total)];
        for entry in &self.portfolios {
            lines.push(format!(
                "{:<10} {:<20} {:<20} {} pending",
                short_id(&entry.portfolio_id.to_string()),
                truncate(&entry.slug, 18),
                entry.status.as_str(),
                entry.pending_blocks.len()
            ));
        }
        lines.join("\n")
    }
}

/// Run a verification subcommand.
pub async fn execute(args: VerifyArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let result = run(&engine, args, json_mode).await;
    engine.shutdown().await;
    result
}

async fn run(engine: &Engine, args: VerifyArgs, json_mode: bool) -> Result<()> {
    let verification = &engine.verification;
    match args.command {
        VerifyCommands::Request { portfolio, block, note } => {
            let actor = args.actor.actor()?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            match block {
                Some(block_id) => {
                    let block = verification.request_verification(id, &block_id, note, &actor).await?;
                    output(&block_action("Verification requested.".to_string(), &block), json_mode);
                }
                None => {
                    let blocks = verification.request_portfolio_verification(id, note, &actor).await?;
                    output(&BlockListOutput::from(blocks.as_slice()), json_mode);
                }
            }
        }

        VerifyCommands::Approve { portfolio, block, note } => {
            let actor = args.actor.actor()?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            match block {
                Some(block_id) => {
                    let block = verification.approve_block(id, &block_id, note, &actor).await?;
                    output(&block_action("Block verified.".to_string(), &block), json_mode);
                }
                None => {
                    let blocks = verification.approve_portfolio(id, note, &actor).await?;
                    output(&BlockListOutput::from(blocks.as_slice()), json_mode);
                }
            }
        }

        VerifyCommands::Reject { portfolio, block, reason } => {
            let reason = reason.unwrap_or_default();
            let actor = args.actor.actor()?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            match block {
                Some(block_id) => {
                    let block = verification.reject_block(id, &block_id, &reason, &actor).await?;
                    output(&block_action("Block rejected.".to_string(), &block), json_mode);
                }
                None => {
                    let blocks = verification.reject_portfolio(id, &reason, &actor).await?;
                    output(&BlockListOutput::from(blocks.as_slice()), json_mode);
                }
            }
        }

        VerifyCommands::History { portfolio, block, limit } => {
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let entries = match block {
                Some(block_id) => verification.block_history(id, &block_id, limit).await?,
                None => verification.portfolio_history(id, limit).await?,
            };
            let out = HistoryOutput {
                total: entries.len(),
                entries,
            };
            output(&out, json_mode);
        }

        VerifyCommands::Queue => {
            let portfolios = verification.pending_queue().await?;
            let out = QueueOutput {
                total: portfolios.len(),
                portfolios,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
