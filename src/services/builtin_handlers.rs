//! Built-in reactive event handlers.
//!
//! Handlers are idempotent: each one recomputes from stored state rather
//! than applying deltas, so replaying an event is harmless.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::verification::requires_verification;
use crate::services::event_bus::{DomainEvent, EventCategory, EventPayload};
use crate::services::event_reactor::{
    EventFilter, EventHandler, HandlerContext, HandlerId, HandlerMetadata, HandlerPriority, Reaction,
};
use crate::services::rating_service::RatingService;

// ============================================================================
// RatingRecalculationHandler
// ============================================================================

/// Recompute the portfolio rating whenever one of its inputs changes:
/// verification-required blocks, verification outcomes, the ILS level or
/// the student's evidence.
pub struct RatingRecalculationHandler {
    rating: Arc<RatingService>,
}

impl RatingRecalculationHandler {
    pub fn new(rating: Arc<RatingService>) -> Self {
        Self { rating }
    }

    fn recalculated(cause: &DomainEvent, portfolio_id: Uuid, rating: f64) -> DomainEvent {
        DomainEvent::caused_by(cause, EventPayload::RatingRecalculated { portfolio_id, rating })
    }
}

/// Block events only move the rating when they touch a block the rating
/// reads.
fn is_rating_relevant(event: &DomainEvent) -> bool {
    match &event.payload {
        EventPayload::BlockAdded { block_type, .. }
        | EventPayload::BlockUpdated { block_type, .. }
        | EventPayload::BlockRemoved { block_type, .. } => requires_verification(block_type),
        EventPayload::BlocksReordered { touches_required, .. } => *touches_required,
        EventPayload::VerificationChanged { .. }
        | EventPayload::IlsLevelChanged { .. }
        | EventPayload::EvidenceRecorded { .. } => true,
        _ => false,
    }
}

#[async_trait]
impl EventHandler for RatingRecalculationHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            id: HandlerId::new(),
            name: "RatingRecalculationHandler".to_string(),
            filter: EventFilter::new()
                .categories(vec![
                    EventCategory::Block,
                    EventCategory::Verification,
                    EventCategory::Portfolio,
                    EventCategory::Evidence,
                ])
                .payload_types(vec![
                    "BlockAdded".to_string(),
                    "BlockUpdated".to_string(),
                    "BlockRemoved".to_string(),
                    "BlocksReordered".to_string(),
                    "VerificationChanged".to_string(),
                    "IlsLevelChanged".to_string(),
                    "EvidenceRecorded".to_string(),
                ])
                .predicate(is_rating_relevant),
            priority: HandlerPriority::NORMAL,
        }
    }

    async fn handle(&self, event: &DomainEvent, _ctx: &HandlerContext) -> Result<Reaction, String> {
        let reactions = match &event.payload {
            EventPayload::EvidenceRecorded { student_id, .. } => self
                .rating
                .recalculate_for_student(*student_id)
                .await
                .map_err(|e| format!("Failed to recalculate ratings for student {student_id}: {e}"))?
                .into_iter()
                .map(|(portfolio_id, rating)| Self::recalculated(event, portfolio_id, rating))
                .collect(),
            _ => {
                let Some(portfolio_id) = event.portfolio_id else {
                    return Ok(Reaction::None);
                };
                let rating = self
                    .rating
                    .recalculate(portfolio_id)
                    .await
                    .map_err(|e| format!("Failed to recalculate rating for {portfolio_id}: {e}"))?;
                vec![Self::recalculated(event, portfolio_id, rating)]
            }
        };

        if reactions.is_empty() {
            Ok(Reaction::None)
        } else {
            Ok(Reaction::EmitEvents(reactions))
        }
    }
}
