//! Rating recalculation.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{PortfolioFilter, PortfolioRepository, RatingSignalSource};
use crate::services::layout_migration::ensure_blocks_structure;
use crate::services::rating_engine::RatingEngine;

/// Recomputes and stores ratings.
pub struct RatingService {
    portfolios: Arc<dyn PortfolioRepository>,
    signals: Arc<dyn RatingSignalSource>,
    engine: RatingEngine,
}

impl RatingService {
    pub fn new(
        portfolios: Arc<dyn PortfolioRepository>,
        signals: Arc<dyn RatingSignalSource>,
        engine: RatingEngine,
    ) -> Self {
        Self {
            portfolios,
            signals,
            engine,
        }
    }

    /// Recompute and store the rating of one portfolio. Only the rating
    /// column is written; the layout version is left alone so concurrent
    /// block edits are not invalidated.
    pub async fn recalculate(&self, portfolio_id: Uuid) -> DomainResult<f64> {
        let document = self
            .portfolios
            .get(portfolio_id)
            .await?
            .ok_or(DomainError::PortfolioNotFound(portfolio_id))?;
        let portfolio = ensure_blocks_structure(document);
        let signals = self.signals.signals_for(portfolio.meta.student_id).await?;

        let rating = self.engine.compute(&portfolio, &signals);
        self.portfolios.update_rating(portfolio_id, rating).await?;

        tracing::info!(
            portfolio_id = %portfolio_id,
            previous = portfolio.meta.rating,
            rating,
            "rating recalculated"
        );
        Ok(rating)
    }

    /// Recalculate every portfolio of a student. Individual failures are
    /// logged and skipped.
    pub async fn recalculate_for_student(&self, student_id: Uuid) -> DomainResult<Vec<(Uuid, f64)>> {
        let filter = PortfolioFilter {
            student_id: Some(student_id),
            ..Default::default()
        };
        let documents = self.portfolios.list(filter).await?;

        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.meta.id;
            match self.recalculate(id).await {
                Ok(rating) => results.push((id, rating)),
                Err(e) => tracing::warn!(portfolio_id = %id, error = %e, "rating recalculation failed"),
            }
        }
        Ok(results)
    }
}
