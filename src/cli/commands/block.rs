//! Block CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::application::Engine;
use crate::cli::commands::open_engine;
use crate::cli::id_resolver::resolve_portfolio_id;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::ActorArgs;
use crate::domain::models::{Block, BlockOrder, BlockPatch, BlockVisibility, Config, NewBlock};
use crate::services::content_object;

/// Arguments for `folio block`.
#[derive(Args, Debug)]
pub struct BlockArgs {
    #[command(subcommand)]
    pub command: BlockCommands,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Block editing subcommands.
#[derive(Subcommand, Debug)]
pub enum BlockCommands {
    /// List a portfolio's blocks in order
    List {
        /// Portfolio id or slug
        portfolio: String,
    },
    /// Add a block
    Add {
        /// Portfolio id or slug
        portfolio: String,
        /// Block type (text, projects, olympiads, certificates, ...)
        #[arg(short = 't', long = "type")]
        block_type: String,
        /// Block content as a JSON object
        #[arg(short, long)]
        content: Option<String>,
        /// Explicit block id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Insert at this array position and renumber
        #[arg(long, conflicts_with = "order")]
        position: Option<usize>,
        /// Explicit order value
        #[arg(long)]
        order: Option<u32>,
        /// public or private
        #[arg(long)]
        visibility: Option<String>,
    },
    /// Update fields of a block
    Update {
        /// Portfolio id or slug
        portfolio: String,
        /// Block id
        block: String,
        /// New block type
        #[arg(short = 't', long = "type")]
        block_type: Option<String>,
        /// Replacement content as a JSON object
        #[arg(short, long)]
        content: Option<String>,
        /// New order value
        #[arg(long)]
        order: Option<u32>,
        /// public or private
        #[arg(long)]
        visibility: Option<String>,
    },
    /// Reorder blocks, e.g. `intro=1 projects=0`
    Reorder {
        /// Portfolio id or slug
        portfolio: String,
        /// BLOCK_ID=ORDER pairs
        #[arg(required = true)]
        orders: Vec<String>,
    },
    /// Delete a block
    Delete {
        /// Portfolio id or slug
        portfolio: String,
        /// Block id
        block: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct BlockOutput {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub order: u32,
    pub visibility: String,
    pub verification: String,
    pub content: serde_json::Map<String, serde_json::Value>,
}

impl From<&Block> for BlockOutput {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            block_type: block.block_type.clone(),
            order: block.order,
            visibility: block.visibility.as_str().to_string(),
            verification: block.verification.status.as_str().to_string(),
            content: block.content.clone(),
        }
    }
}

impl BlockOutput {
    fn row(&self) -> String {
        format!(
            "{:<6} {:<24} {:<14} {:<8} {:<12}",
            self.order,
            truncate(&self.id, 22),
            truncate(&self.block_type, 12),
            self.visibility,
            self.verification
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BlockListOutput {
    pub blocks: Vec<BlockOutput>,
    pub total: usize,
}

impl CommandOutput for BlockListOutput {
    fn to_human(&self) -> String {
        if self.blocks.is_empty() {
            return "No blocks found.".to_string();
        }
        let mut lines = vec![format!(
            "{:<6} {:<24} {:<14} {:<8} {:<12}",
            "ORDER", "ID", "TYPE", "VISIBLE", "VERIFICATION"
        )];
        lines.push("-".repeat(68));
        lines.extend(self.blocks.iter().map(BlockOutput::row));
        lines.join("\n")
    }
}

impl From<&[Block]> for BlockListOutput {
    fn from(blocks: &[Block]) -> Self {
        Self {
            total: blocks.len(),
            blocks: blocks.iter().map(BlockOutput::from).collect(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BlockActionOutput {
    pub success: bool,
    pub message: String,
    pub block: Option<BlockOutput>,
}

impl CommandOutput for BlockActionOutput {
    fn to_human(&self) -> String {
        match &self.block {
            Some(block) => format!(
                "{}\n  ID:           {}\n  Type:         {}\n  Order:        {}\n  Verification: {}",
                self.message, block.id, block.block_type, block.order, block.verification
            ),
            None => self.message.clone(),
        }
    }
}

pub(crate) fn block_action(message: String, block: &Block) -> BlockActionOutput {
    BlockActionOutput {
        success: true,
        message,
        block: Some(BlockOutput::from(block)),
    }
}

fn parse_content(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Block content is not valid JSON")?;
    Ok(content_object(value)?)
}

fn parse_visibility(raw: Option<String>) -> Result<Option<BlockVisibility>> {
    raw.map(|v| BlockVisibility::from_str(&v).ok_or_else(|| anyhow::anyhow!("Invalid visibility: {v}")))
        .transpose()
}

/// Parse `BLOCK_ID=ORDER` pairs. The id may itself contain `=`.
pub fn parse_orders(pairs: &[String]) -> Result<Vec<BlockOrder>> {
    pairs
        .iter()
        .map(|pair| {
            let (id, order) = pair
                .rsplit_once('=')
                .ok_or_else(|| anyhow::anyhow!("Expected BLOCK_ID=ORDER, got '{pair}'"))?;
            let order: u32 = order
                .parse()
                .with_context(|| format!("Invalid order '{order}' for block {id}"))?;
            Ok(BlockOrder::new(id, order))
        })
        .collect()
}

/// Run a block subcommand.
pub async fn execute(args: BlockArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let result = run(&engine, args, json_mode).await;
    engine.shutdown().await;
    result
}

async fn run(engine: &Engine, args: BlockArgs, json_mode: bool) -> Result<()> {
    match args.command {
        BlockCommands::List { portfolio } => {
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let blocks = engine.blocks.list_blocks(id).await?;
            output(&BlockListOutput::from(blocks.as_slice()), json_mode);
        }

        BlockCommands::Add {
            portfolio,
            block_type,
            content,
            id,
            position,
            order,
            visibility,
        } => {
            let actor = args.actor.actor()?;
            let portfolio_id = resolve_portfolio_id(engine, &portfolio).await?;
            let request = NewBlock {
                id,
                block_type: Some(block_type),
                content: content.as_deref().map(parse_content).transpose()?,
                visibility: parse_visibility(visibility)?,
                order,
                position,
                ..Default::default()
            };
            let block = engine.blocks.add_block(portfolio_id, request, &actor).await?;
            output(&block_action("Block added.".to_string(), &block), json_mode);
        }

        BlockCommands::Update {
            portfolio,
            block,
            block_type,
            content,
            order,
            visibility,
        } => {
            let actor = args.actor.actor()?;
            let portfolio_id = resolve_portfolio_id(engine, &portfolio).await?;
            let patch = BlockPatch {
                block_type,
                content: content.as_deref().map(parse_content).transpose()?,
                visibility: parse_visibility(visibility)?,
                order,
                ..Default::default()
            };
            let block = engine.blocks.update_block(portfolio_id, &block, patch, &actor).await?;
            output(&block_action("Block updated.".to_string(), &block), json_mode);
        }

        BlockCommands::Reorder { portfolio, orders } => {
            let actor = args.actor.actor()?;
            let portfolio_id = resolve_portfolio_id(engine, &portfolio).await?;
            let orders = parse_orders(&orders)?;
            let blocks = engine.blocks.reorder_blocks(portfolio_id, &orders, &actor).await?;
            output(&BlockListOutput::from(blocks.as_slice()), json_mode);
        }

        BlockCommands::Delete { portfolio, block } => {
            let actor = args.actor.actor()?;
            let portfolio_id = resolve_portfolio_id(engine, &portfolio).await?;
            let removed = engine.blocks.delete_block(portfolio_id, &block, &actor).await?;
            output(&block_action("Block deleted.".to_string(), &removed), json_mode);
        }
    }

    Ok(())
}
