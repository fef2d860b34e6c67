//! Portfolio CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::application::Engine;
use crate::cli::commands::open_engine;
use crate::cli::id_resolver::{parse_student_id, resolve_portfolio_id};
use crate::cli::output::{output, short_id, truncate, CommandOutput};
use crate::cli::ActorArgs;
use crate::domain::models::{Config, NewPortfolio, Portfolio, PortfolioVisibility, PublicationStatus, Section};
use crate::services::{ensure_blocks_structure, MigrationSummary, PortfolioView};

/// Arguments for `folio portfolio`.
#[derive(Args, Debug)]
pub struct PortfolioArgs {
    #[command(subcommand)]
    pub command: PortfolioCommands,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Portfolio lifecycle subcommands.
#[derive(Subcommand, Debug)]
pub enum PortfolioCommands {
    /// Create a portfolio for a student
    Create {
        /// Owning student id
        #[arg(long)]
        student: String,
        /// URL slug, unique across portfolios
        #[arg(long)]
        slug: String,
        /// Portfolio title
        #[arg(long)]
        title: String,
        /// Visibility (public, private, unlisted)
        #[arg(long)]
        visibility: Option<String>,
        /// JSON file with legacy sections to import
        #[arg(long)]
        sections: Option<PathBuf>,
    },
    /// List a student's portfolios
    List {
        /// Student id
        #[arg(long)]
        student: String,
    },
    /// Show the full normalized portfolio
    Show {
        /// Portfolio id or slug
        portfolio: String,
    },
    /// Render a portfolio as the acting viewer sees it (anonymous without --as)
    View {
        /// Portfolio slug
        slug: String,
    },
    /// Publish a portfolio
    Publish {
        /// Portfolio id or slug
        portfolio: String,
    },
    /// Set the publication status
    Status {
        /// Portfolio id or slug
        portfolio: String,
        /// draft or published
        status: String,
    },
    /// Change visibility
    Visibility {
        /// Portfolio id or slug
        portfolio: String,
        /// public, private or unlisted
        visibility: String,
    },
    /// Set the ILS level (1-9); admins only
    Ils {
        /// Portfolio id or slug
        portfolio: String,
        /// New level
        level: u8,
    },
    /// Convert one portfolio's legacy sections into blocks
    Migrate {
        /// Portfolio id or slug
        portfolio: String,
    },
    /// Convert every portfolio still on legacy sections
    MigrateAll,
    /// Recalculate the rating now
    Rate {
        /// Portfolio id or slug
        portfolio: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct PortfolioOutput {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub status: String,
    pub visibility: String,
    pub verification: String,
    pub ils_level: u8,
    pub rating: f64,
    pub blocks: usize,
    pub version: u64,
}

impl From<&Portfolio> for PortfolioOutput {
    fn from(portfolio: &Portfolio) -> Self {
        let meta = &portfolio.meta;
        Self {
            id: meta.id.to_string(),
            slug: meta.slug.as_str().to_string(),
            title: meta.title.clone(),
            status: meta.status.as_str().to_string(),
            visibility: meta.visibility.as_str().to_string(),
            verification: meta.verification.status.as_str().to_string(),
            ils_level: meta.ils_level,
            rating: meta.rating,
            blocks: portfolio.layout.blocks.len(),
            version: meta.version,
        }
    }
}

impl CommandOutput for PortfolioOutput {
    fn to_human(&self) -> String {
        [
            format!("Portfolio: {}", self.title),
            format!("  ID:           {}", self.id),
            format!("  Slug:         {}", self.slug),
            format!("  Status:       {}", self.status),
            format!("  Visibility:   {}", self.visibility),
            format!("  Verification: {}", self.verification),
            format!("  ILS level:    {}", self.ils_level),
            format!("  Rating:       {:.2}", self.rating),
            format!("  Blocks:       {}", self.blocks),
        ]
        .join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PortfolioActionOutput {
    pub success: bool,
    pub message: String,
    pub portfolio: Option<PortfolioOutput>,
}

impl CommandOutput for PortfolioActionOutput {
    fn to_human(&self) -> String {
        match &self.portfolio {
            Some(portfolio) => format!("{}\n\n{}", self.message, portfolio.to_human()),
            None => self.message.clone(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PortfolioListOutput {
    pub portfolios: Vec<PortfolioOutput>,
    pub total: usize,
}

impl CommandOutput for PortfolioListOutput {
    fn to_human(&self) -> String {
        if self.portfolios.is_empty() {
            return "No portfolios found.".to_string();
        }
        let mut lines = vec![format!("Found {} portfolio(s):\n", self.total)];
        lines.push(format!(
            "{:<10} {:<20} {:<24} {:<10} {:<8}",
            "ID", "SLUG", "TITLE", "STATUS", "RATING"
        ));
        lines.push("-".repeat(76));
        for p in &self.portfolios {
            lines.push(format!(
                "{:<10} {:<20} {:<24} {:<10} {:<8.2}",
                short_id(&p.id),
                truncate(&p.slug, 18),
                truncate(&p.title, 22),
                p.status,
                p.rating
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ViewOutput(pub PortfolioView);

impl CommandOutput for ViewOutput {
    fn to_human(&self) -> String {
        let view = &self.0;
        let mut lines = vec![
            format!("{} ({})", view.title, view.slug),
            format!(
                "Verification: {}   ILS level: {}   Rating: {:.2}",
                view.verification.status().as_str(),
                view.ils_level,
                view.rating
            ),
        ];
        if let Some(student) = &view.student {
            lines.push(format!("Student: {}", student.name()));
        }
        lines.push(String::new());
        if view.layout.blocks.is_empty() {
            lines.push("No visible blocks.".to_string());
        }
        for block in &view.layout.blocks {
            lines.push(format!(
                "  [{}] {:<14} {:<16} {}",
                block.order,
                block.block_type,
                truncate(&block.id, 16),
                block.verification.status().as_str()
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MigrationOutput {
    pub portfolio_id: Option<String>,
    pub migrated: bool,
    pub summary: Option<MigrationSummary>,
}

impl CommandOutput for MigrationOutput {
    fn to_human(&self) -> String {
        match (&self.summary, &self.portfolio_id) {
            (Some(s), _) => format!(
                "Scanned {} portfolio(s): {} migrated, {} failed.",
                s.scanned, s.migrated, s.failed
            ),
            (None, Some(id)) if self.migrated => format!("Portfolio {id} migrated to blocks."),
            (None, Some(id)) => format!("Portfolio {id} already uses blocks."),
            (None, None) => String::new(),
        }
    }
}

fn action(message: String, portfolio: &Portfolio) -> PortfolioActionOutput {
    PortfolioActionOutput {
        success: true,
        message,
        portfolio: Some(PortfolioOutput::from(portfolio)),
    }
}

async fn read_sections(path: &Path) -> Result<Vec<Section>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of sections", path.display()))
}

/// Run a portfolio subcommand.
pub async fn execute(args: PortfolioArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let result = run(&engine, args, json_mode).await;
    engine.shutdown().await;
    result
}

async fn run(engine: &Engine, args: PortfolioArgs, json_mode: bool) -> Result<()> {
    match args.command {
        PortfolioCommands::Create {
            student,
            slug,
            title,
            visibility,
            sections,
        } => {
            let actor = args.actor.actor()?;
            let visibility = visibility
                .map(|v| PortfolioVisibility::from_str(&v).ok_or_else(|| anyhow::anyhow!("Invalid visibility: {v}")))
                .transpose()?;
            let sections = match sections {
                Some(path) => read_sections(&path).await?,
                None => Vec::new(),
            };
            let request = NewPortfolio {
                student_id: parse_student_id(&student)?,
                slug,
                title,
                visibility,
                sections,
                ..Default::default()
            };
            let portfolio = engine.portfolios.create_portfolio(request, &actor).await?;
            output(&action(format!("Portfolio created: {}", portfolio.id()), &portfolio), json_mode);
        }

        PortfolioCommands::List { student } => {
            let documents = engine.portfolios.list_for_student(parse_student_id(&student)?).await?;
            let portfolios: Vec<Portfolio> = documents.into_iter().map(ensure_blocks_structure).collect();
            let out = PortfolioListOutput {
                total: portfolios.len(),
                portfolios: portfolios.iter().map(PortfolioOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        PortfolioCommands::Show { portfolio } => {
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let portfolio = engine.portfolios.get(id).await?;
            output(&PortfolioOutput::from(&portfolio), json_mode);
        }

        PortfolioCommands::View { slug } => {
            let viewer = args.actor.viewer()?;
            let view = engine.portfolios.view_by_slug(&slug, viewer.as_ref()).await?;
            output(&ViewOutput(view), json_mode);
        }

        PortfolioCommands::Publish { portfolio } => {
            let actor = args.actor.actor()?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let portfolio = engine.portfolios.publish(id, &actor).await?;
            output(&action("Portfolio published.".to_string(), &portfolio), json_mode);
        }

        PortfolioCommands::Status { portfolio, status } => {
            let actor = args.actor.actor()?;
            let status =
                PublicationStatus::from_str(&status).ok_or_else(|| anyhow::anyhow!("Invalid status: {status}"))?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let portfolio = engine.portfolios.set_status(id, status, &actor).await?;
            output(&action(format!("Status set to {}.", status.as_str()), &portfolio), json_mode);
        }

        PortfolioCommands::Visibility { portfolio, visibility } => {
            let actor = args.actor.actor()?;
            let visibility = PortfolioVisibility::from_str(&visibility)
                .ok_or_else(|| anyhow::anyhow!("Invalid visibility: {visibility}"))?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let portfolio = engine.portfolios.set_visibility(id, visibility, &actor).await?;
            output(&action(format!("Visibility set to {}.", visibility.as_str()), &portfolio), json_mode);
        }

        PortfolioCommands::Ils { portfolio, level } => {
            let actor = args.actor.actor()?;
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let portfolio = engine.portfolios.set_ils_level(id, level, &actor).await?;
            output(&action(format!("ILS level set to {level}."), &portfolio), json_mode);
        }

        PortfolioCommands::Migrate { portfolio } => {
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let migrated = engine.migration.migrate_portfolio(id).await?;
            let out = MigrationOutput {
                portfolio_id: Some(id.to_string()),
                migrated,
                summary: None,
            };
            output(&out, json_mode);
        }

        PortfolioCommands::MigrateAll => {
            let summary = engine.migration.migrate_all().await?;
            let out = MigrationOutput {
                portfolio_id: None,
                migrated: summary.migrated > 0,
                summary: Some(summary),
            };
            output(&out, json_mode);
        }

        PortfolioCommands::Rate { portfolio } => {
            let id = resolve_portfolio_id(engine, &portfolio).await?;
            let rating = engine.rating.recalculate(id).await?;
            let portfolio = engine.portfolios.get(id).await?;
            output(&action(format!("Rating recalculated: {rating:.2}"), &portfolio), json_mode);
        }
    }

    Ok(())
}
