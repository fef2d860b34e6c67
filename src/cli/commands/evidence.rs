//! Evidence CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::commands::open_engine;
use crate::cli::id_resolver::parse_student_id;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, EvidenceKind, EvidenceRecord};

/// Arguments for `folio evidence`.
#[derive(Args, Debug)]
pub struct EvidenceArgs {
    #[command(subcommand)]
    pub command: EvidenceCommands,
}

/// Evidence subcommands.
#[derive(Subcommand, Debug)]
pub enum EvidenceCommands {
    /// Record an olympiad result, assessment or issued certificate
    Record {
        /// Student the evidence belongs to
        #[arg(long)]
        student: String,
        /// olympiad-result, assessment or certificate
        #[arg(short, long)]
        kind: String,
        /// Platform reference id blocks point at
        #[arg(short, long)]
        reference: String,
        /// Score (0-100), for results and assessments
        #[arg(short, long)]
        score: Option<f64>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct EvidenceOutput {
    pub success: bool,
    pub record: EvidenceRecord,
}

impl CommandOutput for EvidenceOutput {
    fn to_human(&self) -> String {
        let score = self.record.score.map(|s| format!(" (score {s})")).unwrap_or_default();
        format!(
            "Recorded {} {} for student {}{}",
            self.record.kind.as_str(),
            self.record.reference_id,
            self.record.student_id,
            score
        )
    }
}

/// Run an evidence subcommand.
pub async fn execute(args: EvidenceArgs, config: &Config, json_mode: bool) -> Result<()> {
    let EvidenceCommands::Record {
        student,
        kind,
        reference,
        score,
    } = args.command;

    let kind = EvidenceKind::from_str(&kind).ok_or_else(|| anyhow::anyhow!("Invalid evidence kind: {kind}"))?;
    let mut record = EvidenceRecord::new(kind, reference, parse_student_id(&student)?);
    if let Some(score) = score {
        record = record.with_score(score);
    }

    let engine = open_engine(config).await?;
    let result = engine.portfolios.record_evidence(record).await;
    engine.shutdown().await;

    output(&EvidenceOutput { success: true, record: result? }, json_mode);
    Ok(())
}
