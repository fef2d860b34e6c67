//! Portfolio rating computation.
//!
//! The score is a weighted sum of five components, each normalized to
//! [0, 1], scaled to [0, 100] and rounded to two decimals.

use crate::domain::models::portfolio::{MAX_ILS_LEVEL, MIN_ILS_LEVEL};
use crate::domain::models::{BlockVerificationStatus, Portfolio, RatingSignals, RatingWeights};

/// Olympiad results plus platform certificates at which the component saturates.
const ACHIEVEMENT_CAP: f64 = 5.0;
/// Number of blocks at which the content component saturates.
const CONTENT_CAP: f64 = 10.0;
const MAX_ASSESSMENT_SCORE: f64 = 100.0;

/// Normalized component values, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingComponents {
    pub ils_level: f64,
    pub verification: f64,
    pub olympiads: f64,
    pub assessments: f64,
    pub content: f64,
}

/// Pure weighted rating over portfolio content and evidence signals.
#[derive(Debug, Clone, Default)]
pub struct RatingEngine {
    weights: RatingWeights,
}

impl RatingEngine {
    pub fn new(weights: RatingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RatingWeights {
        &self.weights
    }

    pub fn components(portfolio: &Portfolio, signals: &RatingSignals) -> RatingComponents {
        let ils_span = f64::from(MAX_ILS_LEVEL - MIN_ILS_LEVEL);
        let ils = f64::from(portfolio.meta.ils_level.clamp(MIN_ILS_LEVEL, MAX_ILS_LEVEL) - MIN_ILS_LEVEL) / ils_span;

        let required: Vec<_> = portfolio
            .layout
            .blocks
            .iter()
            .filter(|b| b.requires_verification())
            .collect();
        let verification = if required.is_empty() {
            0.0
        } else {
            let verified = required
                .iter()
                .filter(|b| b.verification.status == BlockVerificationStatus::Verified)
                .count();
            count_f64(verified) / count_f64(required.len())
        };

        let achievements = f64::from(signals.olympiad_results.saturating_add(signals.certificates));
        let olympiads = (achievements / ACHIEVEMENT_CAP).min(1.0);

        let assessments = signals
            .average_assessment_score
            .map_or(0.0, |score| (score / MAX_ASSESSMENT_SCORE).clamp(0.0, 1.0));

        let content = (count_f64(portfolio.layout.blocks.len()) / CONTENT_CAP).min(1.0);

        RatingComponents {
            ils_level: ils,
            verification,
            olympiads,
            assessments,
            content,
        }
    }

    /// Compute the rating. Same inputs always give the same output.
    pub fn compute(&self, portfolio: &Portfolio, signals: &RatingSignals) -> f64 {
        let total = self.weights.total();
        if total <= 0.0 {
            return 0.0;
        }
        let c = Self::components(portfolio, signals);
        let w = &self.weights;
        let weighted = w.ils_level * c.ils_level
            + w.verification * c.verification
            + w.olympiads * c.olympiads
            + w.assessments * c.assessments
            + w.content * c.content;
        let score = (weighted / total * 100.0).clamp(0.0, 100.0);
        (score * 100.0).round() / 100.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Block, Layout, LayoutType, PortfolioMeta, Slug};
    use chrono::Utc;
    use uuid::Uuid;

    fn portfolio(ils: u8, blocks: Vec<Block>) -> Portfolio {
        let mut meta = PortfolioMeta::new(Uuid::new_v4(), Slug::parse("rated").unwrap(), "Rated");
        meta.ils_level = ils;
        Portfolio {
            meta,
            layout: Layout::new(LayoutType::SinglePage, blocks),
            sections: vec![],
        }
    }

    #[test]
    fn test_empty_portfolio_scores_zero() {
        let engine = RatingEngine::default();
        assert_eq!(engine.compute(&portfolio(1, vec![]), &RatingSignals::default()), 0.0);
    }

    #[test]
    fn test_maximal_portfolio_scores_hundred() {
        let mut blocks: Vec<Block> = (0..10).map(|i| Block::new(format!("b{i}"), "text")).collect();
        let mut cert = Block::new("cert", "certificates");
        cert.verification.mark_verified("admin", None, Utc::now());
        blocks.push(cert);

        let signals = RatingSignals {
            olympiad_results: 5,
            assessments: 3,
            average_assessment_score: Some(100.0),
            certificates: 0,
        };
        let engine = RatingEngine::default();
        assert_eq!(engine.compute(&portfolio(9, blocks), &signals), 100.0);
    }

    #[test]
    fn test_rounding_and_determinism() {
        let mut pending = Block::new("a", "achievements");
        pending.verification.mark_requested(None, Utc::now());
        let mut verified = Block::new("c", "certificates");
        verified.verification.mark_verified("admin", None, Utc::now());
        let p = portfolio(4, vec![pending, verified, Block::new("t", "text")]);
        let signals = RatingSignals {
            olympiad_results: 1,
            assessments: 1,
            average_assessment_score: Some(80.0),
            certificates: 1,
        };

        let engine = RatingEngine::default();
        let first = engine.compute(&p, &signals);
        assert_eq!(first, engine.compute(&p, &signals));
        // 30*3/8 + 25*0.5 + 20*0.4 + 15*0.8 + 10*0.3
        assert!((first - 46.75).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights() {
        let weights = RatingWeights {
            ils_level: 0.0,
            verification: 0.0,
            olympiads: 0.0,
            assessments: 0.0,
            content: 0.0,
        };
        let engine = RatingEngine::new(weights);
        assert_eq!(engine.compute(&portfolio(9, vec![]), &RatingSignals::default()), 0.0);
    }
}
