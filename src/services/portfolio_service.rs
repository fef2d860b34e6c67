//! Portfolio lifecycle: creation, settings, ILS level, evidence and
//! audience-scoped reads.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::portfolio::validate_ils_level;
use crate::domain::models::{
    Actor, ActorType, EvidenceRecord, LayoutType, NewPortfolio, Portfolio, PortfolioDocument, PortfolioMeta,
    PortfolioVisibility, PublicationStatus, Slug, StoredBlockLayout, StoredLayout, StudentProfile,
};
use crate::domain::ports::{EditabilityGuard, EvidenceStore, PortfolioFilter, PortfolioRepository, StudentRepository};
use crate::services::block_service::load_editable;
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::layout_migration::MigrationService;
use crate::services::visibility::{PortfolioView, VisibilityProjector};

/// Portfolio lifecycle, access checks and viewer projection.
pub struct PortfolioService {
    portfolios: Arc<dyn PortfolioRepository>,
    students: Arc<dyn StudentRepository>,
    evidence: Arc<dyn EvidenceStore>,
    migration: Arc<MigrationService>,
    guard: Arc<dyn EditabilityGuard>,
    projector: Arc<VisibilityProjector>,
    event_bus: Arc<EventBus>,
}

/// Who may see a portfolio at all, before block-level filtering.
fn check_access(meta: &PortfolioMeta, viewer: Option<&Actor>) -> DomainResult<()> {
    let privileged = viewer.is_some_and(|a| a.is_admin() || meta.is_owned_by(&a.id));
    if privileged {
        return Ok(());
    }
    if meta.status == PublicationStatus::Draft {
        return Err(DomainError::Forbidden(format!("portfolio {} is not published", meta.slug)));
    }
    if meta.visibility == PortfolioVisibility::Private {
        return Err(DomainError::Forbidden(format!("portfolio {} is private", meta.slug)));
    }
    Ok(())
}

impl PortfolioService {
    pub fn new(
        portfolios: Arc<dyn PortfolioRepository>,
        students: Arc<dyn StudentRepository>,
        evidence: Arc<dyn EvidenceStore>,
        migration: Arc<MigrationService>,
        guard: Arc<dyn EditabilityGuard>,
        projector: Arc<VisibilityProjector>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            portfolios,
            students,
            evidence,
            migration,
            guard,
            projector,
            event_bus,
        }
    }

    /// Create or replace a student profile.
    pub async fn register_student(&self, profile: StudentProfile) -> DomainResult<StudentProfile> {
        if profile.name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("student name cannot be empty".into()));
        }
        self.students.upsert(&profile).await?;
        tracing::info!(student_id = %profile.id, "student registered");
        Ok(profile)
    }

    /// Create a portfolio. Legacy sections, if supplied, are stored as-is
    /// and migrated on first touch.
    pub async fn create_portfolio(&self, request: NewPortfolio, actor: &Actor) -> DomainResult<Portfolio> {
        if !actor.is_admin() && request.student_id.to_string() != actor.id {
            return Err(DomainError::Forbidden(format!(
                "{} cannot create a portfolio for student {}",
                actor.id, request.student_id
            )));
        }
        let slug = Slug::parse(request.slug)?;
        if request.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed("title cannot be empty".into()));
        }
        if self.students.get(request.student_id).await?.is_none() {
            return Err(DomainError::StudentNotFound(request.student_id));
        }

        let mut meta = PortfolioMeta::new(request.student_id, slug, request.title.trim());
        if let Some(visibility) = request.visibility {
            meta.visibility = visibility;
        }
        if let Some(theme) = request.theme {
            meta.theme = theme;
        }
        if let Some(hero) = request.hero {
            meta.hero = hero;
        }
        if let Some(animations) = request.animations {
            meta.animations = animations;
        }

        let mut document = PortfolioDocument::new(meta).with_sections(request.sections);
        if document.sections.is_empty() {
            document = document.with_layout(StoredLayout::Structured(StoredBlockLayout {
                layout_type: Some(LayoutType::default().as_str().to_string()),
                blocks: Some(Vec::new()),
            }));
        }

        self.portfolios.create(&document).await?;
        tracing::info!(
            portfolio_id = %document.meta.id,
            slug = %document.meta.slug,
            legacy_sections = document.sections.len(),
            "portfolio created"
        );
        self.migration.load_for_read(document.meta.id).await
    }

    /// Normalized portfolio with no audience filtering.
    pub async fn get(&self, portfolio_id: Uuid) -> DomainResult<Portfolio> {
        self.migration.load_for_read(portfolio_id).await
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> DomainResult<Vec<PortfolioDocument>> {
        let filter = PortfolioFilter {
            student_id: Some(student_id),
            ..Default::default()
        };
        self.portfolios.list(filter).await
    }

    /// Serve a portfolio by slug to `viewer` (`None` for anonymous).
    /// Unlisted portfolios are reachable by slug; drafts and private
    /// portfolios only by their owner or an admin.
    pub async fn view_by_slug(&self, slug: &str, viewer: Option<&Actor>) -> DomainResult<PortfolioView> {
        let portfolio = self.migration.load_for_read_by_slug(slug).await?;
        self.project(&portfolio, viewer).await
    }

    /// Project a portfolio for a viewer, after the access check.
    pub async fn view(&self, portfolio_id: Uuid, viewer: Option<&Actor>) -> DomainResult<PortfolioView> {
        let portfolio = self.migration.load_for_read(portfolio_id).await?;
        self.project(&portfolio, viewer).await
    }

    async fn project(&self, portfolio: &Portfolio, viewer: Option<&Actor>) -> DomainResult<PortfolioView> {
        check_access(&portfolio.meta, viewer)?;
        let profile = self.students.get(portfolio.meta.student_id).await?;
        Ok(self.projector.project_portfolio(portfolio, profile.as_ref(), viewer))
    }

    async fn update_meta(
        &self,
        portfolio_id: Uuid,
        actor: &Actor,
        change: impl FnOnce(&mut PortfolioMeta),
    ) -> DomainResult<Portfolio> {
        let mut portfolio = load_editable(&self.migration, self.guard.as_ref(), portfolio_id, actor).await?;
        change(&mut portfolio.meta);
        portfolio.meta.updated_at = Utc::now();
        portfolio.meta.version = self.portfolios.update_meta(&portfolio.meta).await?;
        Ok(portfolio)
    }

    pub async fn set_status(
        &self,
        portfolio_id: Uuid,
        status: PublicationStatus,
        actor: &Actor,
    ) -> DomainResult<Portfolio> {
        let portfolio = self.update_meta(portfolio_id, actor, |meta| meta.status = status).await?;
        tracing::info!(portfolio_id = %portfolio_id, status = status.as_str(), "publication status changed");
        Ok(portfolio)
    }

    /// Shorthand for setting the status to published.
    pub async fn publish(&self, portfolio_id: Uuid, actor: &Actor) -> DomainResult<Portfolio> {
        self.set_status(portfolio_id, PublicationStatus::Published, actor).await
    }

    pub async fn set_visibility(
        &self,
        portfolio_id: Uuid,
        visibility: PortfolioVisibility,
        actor: &Actor,
    ) -> DomainResult<Portfolio> {
        let portfolio = self
            .update_meta(portfolio_id, actor, |meta| meta.visibility = visibility)
            .await?;
        tracing::info!(portfolio_id = %portfolio_id, visibility = visibility.as_str(), "visibility changed");
        Ok(portfolio)
    }

    /// Set the ILS level (1..=9). The level comes from external performance
    /// signals, so only admins and the system may set it, never the owner.
    /// The rating is recalculated by reaction.
    pub async fn set_ils_level(&self, portfolio_id: Uuid, level: u8, actor: &Actor) -> DomainResult<Portfolio> {
        if !matches!(actor.actor_type, ActorType::Admin | ActorType::System) {
            return Err(DomainError::Forbidden(format!(
                "{} actors cannot set the ILS level",
                actor.actor_type.as_str()
            )));
        }
        let level = validate_ils_level(level)?;

        let mut meta = self
            .portfolios
            .get(portfolio_id)
            .await?
            .ok_or(DomainError::PortfolioNotFound(portfolio_id))?
            .meta;
        let previous = meta.ils_level;
        meta.ils_level = level;
        meta.updated_at = Utc::now();
        self.portfolios.update_meta(&meta).await?;

        tracing::info!(portfolio_id = %portfolio_id, from = previous, to = level, actor = %actor.id, "ILS level changed");
        if previous != level {
            self.event_bus
                .emit(EventPayload::IlsLevelChanged {
                    portfolio_id,
                    from: previous,
                    to: level,
                })
                .await;
        }
        self.get(portfolio_id).await
    }

    /// Record a piece of evidence for a student.
    pub async fn record_evidence(&self, record: EvidenceRecord) -> DomainResult<EvidenceRecord> {
        if record.reference_id.trim().is_empty() {
            return Err(DomainError::ValidationFailed("evidence reference id cannot be empty".into()));
        }
        if let Some(score) = record.score {
            if !(0.0..=100.0).contains(&score) {
                return Err(DomainError::ValidationFailed(format!("score {score} is outside 0..=100")));
            }
        }
        if self.students.get(record.student_id).await?.is_none() {
            return Err(DomainError::StudentNotFound(record.student_id));
        }

        self.evidence.record(&record).await?;
        tracing::info!(
            student_id = %record.student_id,
            kind = record.kind.as_str(),
            reference_id = %record.reference_id,
            "evidence recorded"
        );
        self.event_bus
            .emit(EventPayload::EvidenceRecorded {
                student_id: record.student_id,
                kind: record.kind,
                reference_id: record.reference_id.clone(),
            })
            .await;
        Ok(record)
    }
}
