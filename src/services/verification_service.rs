//! Block and portfolio verification flows.
//!
//! Block states move `unverified -> pending -> {verified, rejected}` and a
//! later request may reopen a verified-then-changed or rejected block.
//! The portfolio status is always re-derived from the blocks in the same
//! write that changes them. Every block transition appends one audit entry.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, Block, BlockVerificationStatus, Portfolio, PortfolioVerificationStatus, VerificationAction,
    VerificationLogEntry,
};
use crate::domain::ports::{EditabilityGuard, PortfolioFilter, PortfolioRepository, VerificationLogRepository};
use crate::services::auto_verifier::AutoVerifier;
use crate::services::block_service::{load_editable, persist_blocks};
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::layout_migration::{ensure_blocks_structure, MigrationService};

/// A portfolio waiting for review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub portfolio_id: Uuid,
    pub slug: String,
    pub title: String,
    pub status: PortfolioVerificationStatus,
    pub pending_blocks: Vec<String>,
}

/// Request, approve and reject verification for blocks and whole
/// portfolios, with every transition written to the audit log.
pub struct VerificationService {
    portfolios: Arc<dyn PortfolioRepository>,
    migration: Arc<MigrationService>,
    guard: Arc<dyn EditabilityGuard>,
    auto_verifier: Arc<AutoVerifier>,
    audit: Arc<dyn VerificationLogRepository>,
    event_bus: Arc<EventBus>,
}

fn require_reviewer(actor: &Actor) -> DomainResult<()> {
    if actor.actor_type.can_review() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "{} actors cannot review verification requests",
            actor.actor_type.as_str()
        )))
    }
}

/// Blank reasons are recorded as no reason.
fn normalize_reason(reason: &str) -> Option<String> {
    let reason = reason.trim();
    (!reason.is_empty()).then(|| reason.to_string())
}

fn block_index(portfolio: &Portfolio, block_id: &str) -> DomainResult<usize> {
    portfolio
        .layout
        .blocks
        .iter()
        .position(|b| b.id == block_id)
        .ok_or_else(|| DomainError::block_not_found(portfolio.id(), block_id))
}

impl VerificationService {
    pub fn new(
        portfolios: Arc<dyn PortfolioRepository>,
        migration: Arc<MigrationService>,
        guard: Arc<dyn EditabilityGuard>,
        auto_verifier: Arc<AutoVerifier>,
        audit: Arc<dyn VerificationLogRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            portfolios,
            migration,
            guard,
            auto_verifier,
            audit,
            event_bus,
        }
    }

    /// Request review of one block. If the block's evidence already
    /// qualifies, it is auto-verified instead and no request is recorded.
    pub async fn request_verification(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        note: Option<String>,
        actor: &Actor,
    ) -> DomainResult<Block> {
        let portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;
        let index = block_index(&portfolio, block_id)?;
        let current = &portfolio.layout.blocks[index];

        match current.verification.status {
            BlockVerificationStatus::Pending => return Err(DomainError::AlreadyPending(block_id.to_string())),
            BlockVerificationStatus::Verified => return Err(DomainError::AlreadyVerified(block_id.to_string())),
            BlockVerificationStatus::Unverified | BlockVerificationStatus::Rejected => {}
        }

        let (block, entry) = self.request_one(&portfolio, current.clone(), note, actor).await;
        let mut blocks = portfolio.layout.blocks.clone();
        blocks[index] = block;

        let updated = self.commit(&portfolio, blocks, None, vec![entry]).await?;
        find_block(&updated, block_id)
    }

    /// Auto-verify or move into pending, returning the block and its entry.
    async fn request_one(
        &self,
        portfolio: &Portfolio,
        block: Block,
        note: Option<String>,
        actor: &Actor,
    ) -> (Block, VerificationLogEntry) {
        let outcome = self.auto_verifier.auto_verify_block(block, &portfolio.meta).await;
        if let (true, Some(entry)) = (outcome.verified, outcome.entry) {
            return (outcome.block, entry);
        }

        let mut block = outcome.block;
        block.verification.mark_requested(note.clone(), Utc::now());
        let entry = VerificationLogEntry::new(portfolio.id(), block.id.clone(), VerificationAction::Request, actor)
            .with_metadata(json!({ "note": note }));
        (block, entry)
    }

    /// Approve one block. Only admins and external checkers may approve;
    /// beyond that the transition always succeeds.
    pub async fn approve_block(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        note: Option<String>,
        actor: &Actor,
    ) -> DomainResult<Block> {
        require_reviewer(actor)?;
        let portfolio = self.migration.load(portfolio_id).await?;
        let index = block_index(&portfolio, block_id)?;

        let mut blocks = portfolio.layout.blocks.clone();
        blocks[index].verification.mark_verified(actor.id.clone(), note.clone(), Utc::now());
        let entry = VerificationLogEntry::new(portfolio_id, block_id, VerificationAction::Approve, actor)
            .with_metadata(json!({ "note": note }));

        let updated = self.commit(&portfolio, blocks, Some(actor), vec![entry]).await?;
        find_block(&updated, block_id)
    }

    /// Reject one block. The reason is optional; a blank one is stored as
    /// absent.
    pub async fn reject_block(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        reason: &str,
        actor: &Actor,
    ) -> DomainResult<Block> {
        require_reviewer(actor)?;
        let reason = normalize_reason(reason);
        let portfolio = self.migration.load(portfolio_id).await?;
        let index = block_index(&portfolio, block_id)?;

        let mut blocks = portfolio.layout.blocks.clone();
        blocks[index].verification.mark_rejected(actor.id.clone(), reason.clone(), Utc::now());
        let entry = VerificationLogEntry::new(portfolio_id, block_id, VerificationAction::Reject, actor)
            .with_metadata(json!({ "reason": reason }));

        let updated = self.commit(&portfolio, blocks, Some(actor), vec![entry]).await?;
        find_block(&updated, block_id)
    }

    /// Request review of every verification-required block that is neither
    /// verified nor pending. Returns the blocks that changed.
    pub async fn request_portfolio_verification(
        &self,
        portfolio_id: Uuid,
        note: Option<String>,
        actor: &Actor,
    ) -> DomainResult<Vec<Block>> {
        let portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;

        let mut blocks = portfolio.layout.blocks.clone();
        let mut entries = Vec::new();
        for block in &mut blocks {
            let eligible = block.requires_verification()
                && matches!(
                    block.verification.status,
                    BlockVerificationStatus::Unverified | BlockVerificationStatus::Rejected
                );
            if !eligible {
                continue;
            }
            let (changed, entry) = self.request_one(&portfolio, block.clone(), note.clone(), actor).await;
            *block = changed;
            entries.push(entry);
        }

        if entries.is_empty() {
            tracing::debug!(portfolio_id = %portfolio_id, "no blocks eligible for verification");
            return Ok(Vec::new());
        }
        let touched: Vec<String> = entries.iter().map(|e| e.block_id.clone()).collect();
        let updated = self.commit(&portfolio, blocks, None, entries).await?;
        Ok(select_blocks(&updated, &touched))
    }

    /// Approve every pending verification-required block.
    pub async fn approve_portfolio(
        &self,
        portfolio_id: Uuid,
        note: Option<String>,
        actor: &Actor,
    ) -> DomainResult<Vec<Block>> {
        require_reviewer(actor)?;
        let portfolio = self.migration.load(portfolio_id).await?;

        let now = Utc::now();
        let mut blocks = portfolio.layout.blocks.clone();
        let mut entries = Vec::new();
        for block in blocks.iter_mut().filter(|b| is_pending_required(b)) {
            block.verification.mark_verified(actor.id.clone(), note.clone(), now);
            entries.push(
                VerificationLogEntry::new(portfolio_id, block.id.clone(), VerificationAction::Approve, actor)
                    .with_metadata(json!({ "note": note, "scope": "portfolio" })),
            );
        }

        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let touched: Vec<String> = entries.iter().map(|e| e.block_id.clone()).collect();
        let updated = self.commit(&portfolio, blocks, Some(actor), entries).await?;
        Ok(select_blocks(&updated, &touched))
    }

    /// Reject every pending verification-required block and record the
    /// reason at portfolio level.
    pub async fn reject_portfolio(&self, portfolio_id: Uuid, reason: &str, actor: &Actor) -> DomainResult<Vec<Block>> {
        require_reviewer(actor)?;
        let reason = normalize_reason(reason);
        let mut portfolio = self.migration.load(portfolio_id).await?;

        let now = Utc::now();
        let mut blocks = portfolio.layout.blocks.clone();
        let mut entries = Vec::new();
        for block in blocks.iter_mut().filter(|b| is_pending_required(b)) {
            block.verification.mark_rejected(actor.id.clone(), reason.clone(), now);
            entries.push(
                VerificationLogEntry::new(portfolio_id, block.id.clone(), VerificationAction::Reject, actor)
                    .with_metadata(json!({ "reason": reason, "scope": "portfolio" })),
            );
        }

        if entries.is_empty() {
            return Ok(Vec::new());
        }
        portfolio.meta.verification.rejection_reason = reason;
        let touched: Vec<String> = entries.iter().map(|e| e.block_id.clone()).collect();
        let updated = self.commit(&portfolio, blocks, Some(actor), entries).await?;
        Ok(select_blocks(&updated, &touched))
    }

    /// Audit history of one block, newest first. Works for deleted blocks.
    pub async fn block_history(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        limit: Option<u32>,
    ) -> DomainResult<Vec<VerificationLogEntry>> {
        self.audit.history_for_block(portfolio_id, block_id, limit).await
    }

    /// Audit history of a whole portfolio, newest first.
    pub async fn portfolio_history(
        &self,
        portfolio_id: Uuid,
        limit: Option<u32>,
    ) -> DomainResult<Vec<VerificationLogEntry>> {
        self.audit.history_for_portfolio(portfolio_id, limit).await
    }

    /// Portfolios with blocks awaiting review.
    pub async fn pending_queue(&self) -> DomainResult<Vec<QueueEntry>> {
        let filter = PortfolioFilter {
            verification_statuses: vec![
                PortfolioVerificationStatus::Pending,
                PortfolioVerificationStatus::PartiallyVerified,
            ],
            ..Default::default()
        };
        let documents = self.portfolios.list(filter).await?;

        let queue = documents
            .into_iter()
            .map(ensure_blocks_structure)
            .filter_map(|portfolio| {
                let pending_blocks: Vec<String> = portfolio
                    .layout
                    .blocks
                    .iter()
                    .filter(|b| is_pending_required(b))
                    .map(|b| b.id.clone())
                    .collect();
                if pending_blocks.is_empty() {
                    return None;
                }
                Some(QueueEntry {
                    portfolio_id: portfolio.id(),
                    slug: portfolio.meta.slug.to_string(),
                    title: portfolio.meta.title.clone(),
                    status: portfolio.meta.verification.status,
                    pending_blocks,
                })
            })
            .collect();
        Ok(queue)
    }

    /// Persist the new blocks together with their audit entries, then
    /// publish one event per transition.
    async fn commit(
        &self,
        portfolio: &Portfolio,
        blocks: Vec<Block>,
        reviewer: Option<&Actor>,
        entries: Vec<VerificationLogEntry>,
    ) -> DomainResult<Portfolio> {
        let updated = persist_blocks(
            self.portfolios.as_ref(),
            portfolio,
            blocks,
            reviewer.map(|a| a.id.as_str()),
            &entries,
        )
        .await?;

        for entry in &entries {
            tracing::info!(
                portfolio_id = %entry.portfolio_id,
                block_id = %entry.block_id,
                action = entry.action.as_str(),
                actor_type = entry.actor_type.as_str(),
                portfolio_status = updated.meta.verification.status.as_str(),
                "verification transition"
            );
        }
        for entry in entries {
            self.event_bus
                .emit(EventPayload::VerificationChanged {
                    portfolio_id: entry.portfolio_id,
                    block_id: entry.block_id,
                    action: entry.action,
                    portfolio_status: updated.meta.verification.status,
                })
                .await;
        }
        Ok(updated)
    }
}

fn is_pending_required(block: &Block) -> bool {
    block.requires_verification() && block.verification.status == BlockVerificationStatus::Pending
}

fn find_block(portfolio: &Portfolio, block_id: &str) -> DomainResult<Block> {
    portfolio
        .layout
        .find(block_id)
        .cloned()
        .ok_or_else(|| DomainError::block_not_found(portfolio.id(), block_id))
}

fn select_blocks(portfolio: &Portfolio, ids: &[String]) -> Vec<Block> {
    portfolio
        .layout
        .blocks
        .iter()
        .filter(|b| ids.contains(&b.id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ActorType;

    #[test]
    fn test_only_admins_and_external_checkers_review() {
        assert!(require_reviewer(&Actor::admin("a")).is_ok());
        assert!(require_reviewer(&Actor::new("checker", ActorType::External)).is_ok());
        let err = require_reviewer(&Actor::student("s")).unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Forbidden);
    }

    #[test]
    fn test_blank_rejection_reason_is_absent() {
        assert_eq!(normalize_reason("   "), None);
        assert_eq!(normalize_reason(""), None);
        assert_eq!(normalize_reason(" blurry scan ").as_deref(), Some("blurry scan"));
    }
}
