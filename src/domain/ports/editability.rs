//! Editability check port.
//!
//! The engine asks this collaborator before every mutation and treats any
//! returned reason as a veto, without interpreting the policy itself.

use async_trait::async_trait;

use crate::domain::models::{Actor, PortfolioMeta};

/// Decides whether an actor may modify a portfolio.
#[async_trait]
pub trait EditabilityGuard: Send + Sync {
    /// `None` allows the edit; `Some(reason)` vetoes it.
    async fn check(&self, portfolio: &PortfolioMeta, actor: &Actor) -> Option<String>;
}

/// Allows edits by the owning student and by admins.
#[derive(Debug, Clone, Default)]
pub struct OwnershipGuard;

impl OwnershipGuard {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EditabilityGuard for OwnershipGuard {
    async fn check(&self, portfolio: &PortfolioMeta, actor: &Actor) -> Option<String> {
        if actor.is_admin() || portfolio.is_owned_by(&actor.id) {
            None
        } else {
            Some(format!("{} does not own portfolio {}", actor.id, portfolio.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Slug;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_ownership_guard() {
        let owner = Uuid::new_v4();
        let meta = PortfolioMeta::new(owner, Slug::parse("owned").unwrap(), "Owned");
        let guard = OwnershipGuard::new();

        assert!(guard.check(&meta, &Actor::student(owner.to_string())).await.is_none());
        assert!(guard.check(&meta, &Actor::admin("admin-1")).await.is_none());
        assert!(guard.check(&meta, &Actor::student(Uuid::new_v4().to_string())).await.is_some());
    }
}
