//! Verification audit sink port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::VerificationLogEntry;

/// Append-only store of verification transitions. Entries are never
/// updated or deleted, and outlive the blocks they describe.
#[async_trait]
pub trait VerificationLogRepository: Send + Sync {
    async fn append(&self, entry: &VerificationLogEntry) -> DomainResult<()>;

    /// History of one block, newest first.
    async fn history_for_block(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        limit: Option<u32>,
    ) -> DomainResult<Vec<VerificationLogEntry>>;

    /// History of every block of a portfolio, newest first.
    async fn history_for_portfolio(&self, portfolio_id: Uuid, limit: Option<u32>)
        -> DomainResult<Vec<VerificationLogEntry>>;
}
