//! Block operations on a portfolio's layout.
//!
//! Every operation loads the portfolio through the migration engine, asks
//! the editability guard, applies a pure layout transform and persists the
//! result with one version-checked write.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::verification::requires_verification;
use crate::domain::models::{
    Actor, Block, BlockOrder, BlockPatch, Layout, NewBlock, Portfolio, VerificationAction, VerificationLogEntry,
};
use crate::domain::ports::{EditabilityGuard, PortfolioRepository};
use crate::services::auto_verifier::AutoVerifier;
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::layout_migration::MigrationService;

/// Accept only a JSON object as block content.
pub fn content_object(value: Value) -> DomainResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::ValidationFailed(format!(
            "block content must be an object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Persist `blocks` as the portfolio's layout together with the re-derived
/// portfolio verification record and the audit entries of the transitions
/// it contains, in one write. `actor` becomes the portfolio verifier if the
/// derived status turns verified.
pub(crate) async fn persist_blocks(
    portfolios: &dyn PortfolioRepository,
    portfolio: &Portfolio,
    blocks: Vec<Block>,
    actor: Option<&str>,
    audit: &[VerificationLogEntry],
) -> DomainResult<Portfolio> {
    let now = Utc::now();
    let layout = Layout::new(portfolio.layout.layout_type, blocks);
    let verification = portfolio.meta.verification.rederive(&layout.blocks, actor, now);
    let version = portfolios
        .replace_layout(portfolio.id(), &layout, &verification, portfolio.meta.version, audit)
        .await?;

    let mut updated = portfolio.clone();
    updated.layout = layout;
    updated.meta.verification = verification;
    updated.meta.version = version;
    updated.meta.updated_at = now;
    Ok(updated)
}

/// Load a portfolio for mutation and apply the editability veto.
pub(crate) async fn load_editable(
    migration: &MigrationService,
    guard: &dyn EditabilityGuard,
    portfolio_id: Uuid,
    actor: &Actor,
) -> DomainResult<Portfolio> {
    let portfolio = migration.load(portfolio_id).await?;
    if let Some(reason) = guard.check(&portfolio.meta, actor).await {
        tracing::info!(portfolio_id = %portfolio_id, actor = %actor.id, reason = %reason, "edit vetoed");
        return Err(DomainError::Forbidden(reason));
    }
    Ok(portfolio)
}

/// Block editing: add, update, reorder, delete and list.
pub struct BlockService {
    portfolios: Arc<dyn PortfolioRepository>,
    migration: Arc<MigrationService>,
    guard: Arc<dyn EditabilityGuard>,
    auto_verifier: Arc<AutoVerifier>,
    event_bus: Arc<EventBus>,
}

impl BlockService {
    pub fn new(
        portfolios: Arc<dyn PortfolioRepository>,
        migration: Arc<MigrationService>,
        guard: Arc<dyn EditabilityGuard>,
        auto_verifier: Arc<AutoVerifier>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            portfolios,
            migration,
            guard,
            auto_verifier,
            event_bus,
        }
    }

    /// Normalized blocks of a portfolio, in order.
    pub async fn list_blocks(&self, portfolio_id: Uuid) -> DomainResult<Vec<Block>> {
        Ok(self.migration.load_for_read(portfolio_id).await?.layout.blocks)
    }

    /// Add a block. The auto-verifier is consulted first, so a block backed
    /// by the student's own evidence is stored already verified.
    pub async fn add_block(&self, portfolio_id: Uuid, request: NewBlock, actor: &Actor) -> DomainResult<Block> {
        let portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;

        let block_id = portfolio.layout.resolve_new_id(request.id.as_deref())?;
        let candidate = request.clone().into_block(block_id.clone());
        let outcome = self.auto_verifier.auto_verify_block(candidate, &portfolio.meta).await;

        let blocks = portfolio.layout.with_block_added(outcome.block, &request)?;
        let audit: Vec<VerificationLogEntry> = outcome.entry.into_iter().collect();
        let updated = persist_blocks(self.portfolios.as_ref(), &portfolio, blocks, None, &audit).await?;

        let block = updated
            .layout
            .find(&block_id)
            .cloned()
            .ok_or_else(|| DomainError::block_not_found(portfolio_id, &block_id))?;

        tracing::info!(
            portfolio_id = %portfolio_id,
            block_id = %block.id,
            block_type = %block.block_type,
            auto_verified = outcome.verified,
            "block added"
        );

        self.event_bus
            .emit(EventPayload::BlockAdded {
                portfolio_id,
                block_id: block.id.clone(),
                block_type: block.block_type.clone(),
            })
            .await;
        if outcome.verified {
            self.event_bus
                .emit(EventPayload::VerificationChanged {
                    portfolio_id,
                    block_id: block.id.clone(),
                    action: VerificationAction::AutoVerify,
                    portfolio_status: updated.meta.verification.status,
                })
                .await;
        }

        Ok(block)
    }

    /// Merge `patch` over an existing block.
    pub async fn update_block(
        &self,
        portfolio_id: Uuid,
        block_id: &str,
        patch: BlockPatch,
        actor: &Actor,
    ) -> DomainResult<Block> {
        let portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;
        let previous_type = portfolio
            .layout
            .find(block_id)
            .map(|b| b.block_type.clone())
            .ok_or_else(|| DomainError::block_not_found(portfolio_id, block_id))?;

        let blocks = portfolio
            .layout
            .with_block_updated(block_id, patch)
            .ok_or_else(|| DomainError::block_not_found(portfolio_id, block_id))?;
        let updated = persist_blocks(self.portfolios.as_ref(), &portfolio, blocks, None, &[]).await?;

        let block = updated
            .layout
            .find(block_id)
            .cloned()
            .ok_or_else(|| DomainError::block_not_found(portfolio_id, block_id))?;

        tracing::info!(portfolio_id = %portfolio_id, block_id = %block_id, "block updated");

        // A type change away from a verification-required type still
        // affects the rating, so report whichever side requires it.
        let reported_type = if requires_verification(&previous_type) {
            previous_type
        } else {
            block.block_type.clone()
        };
        self.event_bus
            .emit(EventPayload::BlockUpdated {
                portfolio_id,
                block_id: block.id.clone(),
                block_type: reported_type,
            })
            .await;

        Ok(block)
    }

    /// Apply explicit orders and sort the layout by order.
    pub async fn reorder_blocks(
        &self,
        portfolio_id: Uuid,
        orders: &[BlockOrder],
        actor: &Actor,
    ) -> DomainResult<Vec<Block>> {
        let portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;

        let blocks = portfolio
            .layout
            .with_blocks_reordered(orders)
            .map_err(|missing| DomainError::block_not_found(portfolio_id, missing))?;
        let touches_required = orders.iter().any(|entry| {
            portfolio
                .layout
                .find(&entry.block_id)
                .is_some_and(Block::requires_verification)
        });
        let updated = persist_blocks(self.portfolios.as_ref(), &portfolio, blocks, None, &[]).await?;

        tracing::info!(portfolio_id = %portfolio_id, moved = orders.len(), "blocks reordered");

        self.event_bus
            .emit(EventPayload::BlocksReordered {
                portfolio_id,
                block_count: updated.layout.blocks.len(),
                touches_required,
            })
            .await;

        Ok(updated.layout.blocks)
    }

    /// Remove a block and renumber the rest. Its audit history is kept.
    pub async fn delete_block(&self, portfolio_id: Uuid, block_id: &str, actor: &Actor) -> DomainResult<Block> {
        let portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;

        let (removed, blocks) = portfolio
            .layout
            .with_block_removed(block_id)
            .ok_or_else(|| DomainError::block_not_found(portfolio_id, block_id))?;
        persist_blocks(self.portfolios.as_ref(), &portfolio, blocks, None, &[]).await?;

        tracing::info!(portfolio_id = %portfolio_id, block_id = %block_id, "block deleted");

        self.event_bus
            .emit(EventPayload::BlockRemoved {
                portfolio_id,
                block_id: removed.id.clone(),
                block_type: removed.block_type.clone(),
            })
            .await;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_must_be_object() {
        assert!(content_object(json!({"text": "hi"})).is_ok());
        let err = content_object(json!("hi")).unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
        assert!(content_object(json!([1])).is_err());
    }
}
