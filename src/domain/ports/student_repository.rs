//! Student profile port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::StudentProfile;

/// Storage for student profiles.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Insert or replace a profile.
    async fn upsert(&self, profile: &StudentProfile) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<StudentProfile>>;
}
