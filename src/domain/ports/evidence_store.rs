//! Evidence store and rating signal ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EvidenceLookup, EvidenceRecord, EvidenceReference, RatingSignals};

/// Registry of olympiad results, assessments and platform certificates.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn lookup(&self, reference: &EvidenceReference) -> DomainResult<EvidenceLookup>;

    /// Record (or replace) a piece of evidence.
    async fn record(&self, record: &EvidenceRecord) -> DomainResult<()>;
}

/// Read-only source of the profile signals the rating engine consumes.
#[async_trait]
pub trait RatingSignalSource: Send + Sync {
    async fn signals_for(&self, student_id: Uuid) -> DomainResult<RatingSignals>;
}
