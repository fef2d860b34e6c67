//! SQLite evidence registry. Also serves as the rating signal source,
//! since the signals are aggregates over the same records.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EvidenceKind, EvidenceLookup, EvidenceRecord, EvidenceReference, RatingSignals};
use crate::domain::ports::{EvidenceStore, RatingSignalSource};

/// SQLite-backed evidence records and rating signals.
#[derive(Clone)]
pub struct SqliteEvidenceStore {
    pool: SqlitePool,
}

impl SqliteEvidenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceStore for SqliteEvidenceStore {
    async fn lookup(&self, reference: &EvidenceReference) -> DomainResult<EvidenceLookup> {
        let row: Option<EvidenceRow> = sqlx::query_as(
            "SELECT kind, reference_id, student_id, score, recorded_at FROM evidence_records WHERE kind = ? AND reference_id = ?",
        )
        .bind(reference.kind.as_str())
        .bind(&reference.reference_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(EvidenceLookup::Found(row.try_into()?)),
            None => Ok(EvidenceLookup::NotFound),
        }
    }

    async fn record(&self, record: &EvidenceRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO evidence_records (kind, reference_id, student_id, score, recorded_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(kind, reference_id) DO UPDATE SET student_id = excluded.student_id,
               score = excluded.score, recorded_at = excluded.recorded_at"#,
        )
        .bind(record.kind.as_str())
        .bind(&record.reference_id)
        .bind(record.student_id.to_string())
        .bind(record.score)
        .bind(format_datetime(&record.recorded_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RatingSignalSource for SqliteEvidenceStore {
    async fn signals_for(&self, student_id: Uuid) -> DomainResult<RatingSignals> {
        let rows: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
            "SELECT kind, COUNT(*), AVG(score) FROM evidence_records WHERE student_id = ? GROUP BY kind",
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut signals = RatingSignals::default();
        for (kind, count, average) in rows {
            let count = u32::try_from(count).unwrap_or(u32::MAX);
            match EvidenceKind::from_str(&kind) {
                Some(EvidenceKind::OlympiadResult) => signals.olympiad_results = count,
                Some(EvidenceKind::Assessment) => {
                    signals.assessments = count;
                    signals.average_assessment_score = average;
                }
                Some(EvidenceKind::Certificate) => signals.certificates = count,
                None => tracing::warn!(kind = %kind, "unknown evidence kind ignored"),
            }
        }
        Ok(signals)
    }
}

#[derive(sqlx::FromRow)]
struct EvidenceRow {
    kind: String,
    reference_id: String,
    student_id: String,
    score: Option<f64>,
    recorded_at: String,
}

impl TryFrom<EvidenceRow> for EvidenceRecord {
    type Error = DomainError;

    fn try_from(row: EvidenceRow) -> Result<Self, Self::Error> {
        let kind = EvidenceKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid evidence kind: {}", row.kind)))?;

        Ok(EvidenceRecord {
            kind,
            reference_id: row.reference_id,
            student_id: parse_uuid(&row.student_id)?,
            score: row.score,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}
