//! SQLite implementation of the append-only verification log.

use async_trait::async_trait;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_json_or_default, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActorType, VerificationAction, VerificationLogEntry};
use crate::domain::ports::VerificationLogRepository;

/// Append-only verification audit log.
#[derive(Clone)]
pub struct SqliteVerificationLogRepository {
    pool: SqlitePool,
}

impl SqliteVerificationLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Insert one log entry through any executor, so layout writes can append
/// their entries inside their own transaction.
pub(crate) async fn insert_entry<'e, E>(executor: E, entry: &VerificationLogEntry) -> DomainResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"INSERT INTO verification_log (id, portfolio_id, block_id, action, actor_id, actor_type, timestamp, metadata)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(entry.id.to_string())
    .bind(entry.portfolio_id.to_string())
    .bind(&entry.block_id)
    .bind(entry.action.as_str())
    .bind(&entry.actor_id)
    .bind(entry.actor_type.as_str())
    .bind(format_datetime(&entry.timestamp))
    .bind(entry.metadata.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl VerificationLogRepository for SqliteVerificationLogRepository {
    async fn append(&self, entry: &VerificationLogEntry) -> DomainResult<()> {
        insert_entry(&self.pool, entry).await
    }

    async fn history_for_block(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        limit: Option<u32>,
    ) -> DomainResult<Vec<VerificationLogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"SELECT id, portfolio_id, block_id, action, actor_id, actor_type, timestamp, metadata
               FROM verification_log WHERE portfolio_id = ? AND block_id = ?
               ORDER BY timestamp DESC, rowid DESC LIMIT ?"#,
        )
        .bind(portfolio_id.to_string())
        .bind(block_id)
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn history_for_portfolio(
        &self,
        portfolio_id: Uuid,
        limit: Option<u32>,
    ) -> DomainResult<Vec<VerificationLogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"SELECT id, portfolio_id, block_id, action, actor_id, actor_type, timestamp, metadata
               FROM verification_log WHERE portfolio_id = ?
               ORDER BY timestamp DESC, rowid DESC LIMIT ?"#,
        )
        .bind(portfolio_id.to_string())
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: String,
    portfolio_id: String,
    block_id: String,
    action: String,
    actor_id: Option<String>,
    actor_type: String,
    timestamp: String,
    metadata: Option<String>,
}

impl TryFrom<LogRow> for VerificationLogEntry {
    type Error = DomainError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let action = VerificationAction::from_str(&row.action)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid action: {}", row.action)))?;
        let actor_type = ActorType::from_str(&row.actor_type)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid actor type: {}", row.actor_type)))?;

        Ok(VerificationLogEntry {
            id: parse_uuid(&row.id)?,
            portfolio_id: parse_uuid(&row.portfolio_id)?,
            block_id: row.block_id,
            action,
            actor_id: row.actor_id,
            actor_type,
            timestamp: parse_datetime(&row.timestamp)?,
            metadata: parse_json_or_default(row.metadata)?,
        })
    }
}
