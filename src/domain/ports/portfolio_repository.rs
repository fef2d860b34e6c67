//! Portfolio repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Layout, PortfolioDocument, PortfolioMeta, PortfolioVerification, PortfolioVerificationStatus, PublicationStatus,
    VerificationLogEntry,
};

/// Filter criteria for listing portfolios.
#[derive(Debug, Clone, Default)]
pub struct PortfolioFilter {
    pub student_id: Option<Uuid>,
    pub status: Option<PublicationStatus>,
    /// Match any of these verification statuses (empty = match all).
    pub verification_statuses: Vec<PortfolioVerificationStatus>,
}

/// Repository interface for portfolio persistence.
///
/// Writes are version-checked: a write whose `expected_version` differs from
/// the stored one fails with `ConcurrencyConflict` and changes nothing.
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    /// Create a new portfolio. Fails with `DuplicateSlug` if the slug is taken.
    async fn create(&self, document: &PortfolioDocument) -> DomainResult<()>;

    /// Get a portfolio by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<PortfolioDocument>>;

    /// Get a portfolio by slug.
    async fn get_by_slug(&self, slug: &str) -> DomainResult<Option<PortfolioDocument>>;

    /// List portfolios with optional filters.
    async fn list(&self, filter: PortfolioFilter) -> DomainResult<Vec<PortfolioDocument>>;

    /// Atomically replace the layout subtree together with the derived
    /// verification record, bumping `updatedAt`, and append `audit` to the
    /// verification log in the same transaction. Either all of it is
    /// stored or none of it. Returns the new version.
    async fn replace_layout(
        &self,
        id: Uuid,
        layout: &Layout,
        verification: &PortfolioVerification,
        expected_version: u64,
        audit: &[VerificationLogEntry],
    ) -> DomainResult<u64>;

    /// Replace scalar settings (title, visibility, status, theme, hero,
    /// animations, ILS level). Version-checked against `meta.version`.
    async fn update_meta(&self, meta: &PortfolioMeta) -> DomainResult<u64>;

    /// Write the computed rating. Does not bump the version.
    async fn update_rating(&self, id: Uuid, rating: f64) -> DomainResult<()>;
}
