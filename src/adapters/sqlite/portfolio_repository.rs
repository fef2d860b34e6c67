//! SQLite implementation of the PortfolioRepository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::verification_log_repository::insert_entry;
use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_json_or_default, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::lenient;
use crate::domain::models::{
    Layout, PortfolioDocument, PortfolioMeta, PortfolioVerification, PortfolioVerificationStatus, PortfolioVisibility,
    PublicationStatus, Section, Slug, StoredLayout, VerificationLogEntry,
};
use crate::domain::ports::{PortfolioFilter, PortfolioRepository};

const PORTFOLIO_COLUMNS: &str = "id, student_id, slug, title, visibility, status, theme, hero, animations, layout, \
     sections, verification_status, verified_by, verified_at, rejection_reason, ils_level, rating, version, \
     created_at, updated_at";

/// Portfolio documents in the `portfolios` table, with JSON columns for
/// layout, sections and verification.
#[derive(Clone)]
pub struct SqlitePortfolioRepository {
    pool: SqlitePool,
}

impl SqlitePortfolioRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Tell a stale write apart from a missing row after a guarded update
    /// matched nothing.
    async fn write_conflict(&self, id: Uuid) -> DomainError {
        let exists: Result<Option<(String,)>, sqlx::Error> = sqlx::query_as("SELECT id FROM portfolios WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await;
        match exists {
            Ok(Some(_)) => DomainError::ConcurrencyConflict {
                entity: "portfolio".to_string(),
                id: id.to_string(),
            },
            Ok(None) => DomainError::PortfolioNotFound(id),
            Err(e) => e.into(),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl PortfolioRepository for SqlitePortfolioRepository {
    async fn create(&self, document: &PortfolioDocument) -> DomainResult<()> {
        let meta = &document.meta;
        let layout_json = document.layout.as_ref().map(serde_json::to_string).transpose()?;
        let sections_json = serde_json::to_string(&document.sections)?;

        let result = sqlx::query(
            r#"INSERT INTO portfolios (id, student_id, slug, title, visibility, status, theme, hero, animations,
               layout, sections, verification_status, verified_by, verified_at, rejection_reason, ils_level, rating,
               version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(meta.id.to_string())
        .bind(meta.student_id.to_string())
        .bind(meta.slug.as_str())
        .bind(&meta.title)
        .bind(meta.visibility.as_str())
        .bind(meta.status.as_str())
        .bind(meta.theme.to_string())
        .bind(meta.hero.to_string())
        .bind(meta.animations.to_string())
        .bind(layout_json)
        .bind(&sections_json)
        .bind(meta.verification.status.as_str())
        .bind(&meta.verification.verified_by)
        .bind(meta.verification.verified_at.as_ref().map(format_datetime))
        .bind(&meta.verification.rejection_reason)
        .bind(i64::from(meta.ils_level))
        .bind(meta.rating)
        .bind(meta.version as i64)
        .bind(format_datetime(&meta.created_at))
        .bind(format_datetime(&meta.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::DuplicateSlug(meta.slug.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<PortfolioDocument>> {
        let row: Option<PortfolioRow> =
            sqlx::query_as(&format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> DomainResult<Option<PortfolioDocument>> {
        let row: Option<PortfolioRow> =
            sqlx::query_as(&format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE slug = ?"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: PortfolioFilter) -> DomainResult<Vec<PortfolioDocument>> {
        let mut query = format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(student_id) = &filter.student_id {
            query.push_str(" AND student_id = ?");
            bindings.push(student_id.to_string());
        }

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        if !filter.verification_statuses.is_empty() {
            let placeholders = vec!["?"; filter.verification_statuses.len()].join(", ");
            query.push_str(&format!(" AND verification_status IN ({placeholders})"));
            bindings.extend(filter.verification_statuses.iter().map(|s| s.as_str().to_string()));
        }

        query.push_str(" ORDER BY created_at DESC");

        let mut q = sqlx::query_as::<_, PortfolioRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<PortfolioRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn replace_layout(
        &self,
        id: Uuid,
        layout: &Layout,
        verification: &PortfolioVerification,
        expected_version: u64,
        audit: &[VerificationLogEntry],
    ) -> DomainResult<u64> {
        let layout_json = serde_json::to_string(layout)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE portfolios SET layout = ?, verification_status = ?, verified_by = ?, verified_at = ?,
               rejection_reason = ?, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(&layout_json)
        .bind(verification.status.as_str())
        .bind(&verification.verified_by)
        .bind(verification.verified_at.as_ref().map(format_datetime))
        .bind(&verification.rejection_reason)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.write_conflict(id).await);
        }

        for entry in audit {
            insert_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        Ok(expected_version + 1)
    }

    async fn update_meta(&self, meta: &PortfolioMeta) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"UPDATE portfolios SET title = ?, visibility = ?, status = ?, theme = ?, hero = ?, animations = ?,
               ils_level = ?, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(&meta.title)
        .bind(meta.visibility.as_str())
        .bind(meta.status.as_str())
        .bind(meta.theme.to_string())
        .bind(meta.hero.to_string())
        .bind(meta.animations.to_string())
        .bind(i64::from(meta.ils_level))
        .bind(format_datetime(&meta.updated_at))
        .bind(meta.id.to_string())
        .bind(meta.version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.write_conflict(meta.id).await);
        }

        Ok(meta.version + 1)
    }

    async fn update_rating(&self, id: Uuid, rating: f64) -> DomainResult<()> {
        let result = sqlx::query("UPDATE portfolios SET rating = ? WHERE id = ?")
            .bind(rating)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PortfolioNotFound(id));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PortfolioRow {
    id: String,
    student_id: String,
    slug: String,
    title: String,
    visibility: String,
    status: String,
    theme: Option<String>,
    hero: Option<String>,
    animations: Option<String>,
    layout: Option<String>,
    sections: Option<String>,
    verification_status: String,
    verified_by: Option<String>,
    verified_at: Option<String>,
    rejection_reason: Option<String>,
    ils_level: i64,
    rating: f64,
    version: i64,
    created_at: String,
    updated_at: String,
}

/// Anything in the layout column that matches neither stored shape, even
/// text that is not JSON, is kept as `Malformed`. Reads then serve what
/// they can and writes refuse to replace it.
fn parse_stored_layout(id: &str, raw: Option<String>) -> Option<StoredLayout> {
    let raw = raw?;
    let layout = match serde_json::from_str::<Option<StoredLayout>>(&raw) {
        Ok(layout) => layout,
        Err(e) => {
            tracing::warn!(portfolio_id = %id, error = %e, "layout column is not valid JSON");
            Some(StoredLayout::Malformed(Value::String(raw)))
        }
    };
    if layout.as_ref().is_some_and(StoredLayout::is_malformed) {
        tracing::warn!(portfolio_id = %id, "layout column matches no known shape");
    }
    layout
}

/// Sections are legacy data read field by field; only entries that are not
/// objects at all are dropped.
fn parse_sections(id: &str, raw: Option<String>) -> Vec<Section> {
    let values: Vec<Value> = match raw.map(|s| serde_json::from_str(&s)).transpose() {
        Ok(values) => values.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(portfolio_id = %id, error = %e, "unreadable sections column ignored");
            return Vec::new();
        }
    };
    let (sections, skipped) = lenient::records(values);
    if skipped > 0 {
        tracing::warn!(portfolio_id = %id, skipped, "non-object section entries ignored");
    }
    sections
}

impl TryFrom<PortfolioRow> for PortfolioDocument {
    type Error = DomainError;

    fn try_from(row: PortfolioRow) -> Result<Self, Self::Error> {
        let visibility = PortfolioVisibility::from_str(&row.visibility)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid visibility: {}", row.visibility)))?;
        let status = PublicationStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;
        let verification_status = PortfolioVerificationStatus::from_str(&row.verification_status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid verification status: {}", row.verification_status))
        })?;
        let ils_level = u8::try_from(row.ils_level)
            .map_err(|_| DomainError::SerializationError(format!("Invalid ILS level: {}", row.ils_level)))?;

        let meta = PortfolioMeta {
            id: parse_uuid(&row.id)?,
            student_id: parse_uuid(&row.student_id)?,
            slug: Slug::parse(row.slug).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            title: row.title,
            visibility,
            status,
            theme: parse_json_or_default::<Value>(row.theme)?,
            hero: parse_json_or_default::<Value>(row.hero)?,
            animations: parse_json_or_default::<Value>(row.animations)?,
            verification: PortfolioVerification {
                status: verification_status,
                verified_by: row.verified_by,
                verified_at: parse_optional_datetime(row.verified_at)?,
                rejection_reason: row.rejection_reason,
            },
            ils_level,
            rating: row.rating,
            version: u64::try_from(row.version).unwrap_or_default(),
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        };

        let layout = parse_stored_layout(&row.id, row.layout);
        let sections = parse_sections(&row.id, row.sections);

        Ok(PortfolioDocument { meta, layout, sections })
    }
}
