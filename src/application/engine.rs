//! The assembled engine.
//!
//! Owns the database pool, every service, the event bus and the reactor
//! with its built-in handlers. Mutations publish events; the reactor turns
//! the rating-relevant ones into recalculations in the background.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::adapters::sqlite::{
    database_url, initialize_database, PoolConfig, SqliteEvidenceStore, SqlitePortfolioRepository,
    SqliteStudentRepository, SqliteVerificationLogRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{
    EditabilityGuard, EvidenceStore, OwnershipGuard, PortfolioRepository, RatingSignalSource, StudentRepository,
    VerificationLogRepository,
};
use crate::services::{
    AutoVerifier, BlockService, ContactScrubber, EventBus, EventBusConfig, EventReactor, MigrationService,
    PortfolioService, RatingEngine, RatingRecalculationHandler, RatingService, ReactorConfig, VerificationService,
    VisibilityProjector,
};

/// The wired engine: repositories, services, event bus and reactor over
/// one SQLite pool.
pub struct Engine {
    pool: SqlitePool,
    pub portfolios: Arc<PortfolioService>,
    pub blocks: Arc<BlockService>,
    pub verification: Arc<VerificationService>,
    pub migration: Arc<MigrationService>,
    pub rating: Arc<RatingService>,
    event_bus: Arc<EventBus>,
    reactor: Arc<EventReactor>,
    reactor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Open the configured database, applying pending migrations.
    pub async fn open(config: &Config) -> Result<Self> {
        let url = database_url(&config.database.path);
        let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
            .await
            .with_context(|| format!("Failed to open database {}. Run 'folio init' first.", config.database.path))?;
        Self::from_pool(pool, config).await
    }

    /// Build the engine over an already migrated pool.
    pub async fn from_pool(pool: SqlitePool, config: &Config) -> Result<Self> {
        Self::with_guard(pool, config, Arc::new(OwnershipGuard::new())).await
    }

    /// Build the engine with a custom editability policy.
    pub async fn with_guard(pool: SqlitePool, config: &Config, guard: Arc<dyn EditabilityGuard>) -> Result<Self> {
        let portfolio_repo: Arc<dyn PortfolioRepository> = Arc::new(SqlitePortfolioRepository::new(pool.clone()));
        let audit: Arc<dyn VerificationLogRepository> = Arc::new(SqliteVerificationLogRepository::new(pool.clone()));
        let student_repo: Arc<dyn StudentRepository> = Arc::new(SqliteStudentRepository::new(pool.clone()));
        let evidence_store = Arc::new(SqliteEvidenceStore::new(pool.clone()));
        let evidence: Arc<dyn EvidenceStore> = evidence_store.clone();
        let signals: Arc<dyn RatingSignalSource> = evidence_store;

        let event_bus = Arc::new(EventBus::new(EventBusConfig {
            channel_capacity: config.events.channel_capacity,
        }));

        let migration = Arc::new(MigrationService::new(portfolio_repo.clone()));
        let auto_verifier = Arc::new(AutoVerifier::new(evidence.clone(), config.verification.auto_verify));
        let scrubber = ContactScrubber::new().context("Failed to compile contact patterns")?;
        let projector = Arc::new(VisibilityProjector::new(scrubber));

        let portfolios = Arc::new(PortfolioService::new(
            portfolio_repo.clone(),
            student_repo,
            evidence,
            migration.clone(),
            guard.clone(),
            projector,
            event_bus.clone(),
        ));
        let blocks = Arc::new(BlockService::new(
            portfolio_repo.clone(),
            migration.clone(),
            guard.clone(),
            auto_verifier.clone(),
            event_bus.clone(),
        ));
        let verification = Arc::new(VerificationService::new(
            portfolio_repo.clone(),
            migration.clone(),
            guard,
            auto_verifier,
            audit,
            event_bus.clone(),
        ));
        let rating = Arc::new(RatingService::new(
            portfolio_repo,
            signals,
            RatingEngine::new(config.rating.clone()),
        ));

        let reactor = Arc::new(EventReactor::new(
            event_bus.clone(),
            ReactorConfig {
                max_chain_depth: config.events.max_chain_depth,
                handler_timeout_ms: config.events.handler_timeout_ms,
                ..ReactorConfig::default()
            },
        ));
        reactor
            .register(Arc::new(RatingRecalculationHandler::new(rating.clone())))
            .await;

        Ok(Self {
            pool,
            portfolios,
            blocks,
            verification,
            migration,
            rating,
            event_bus,
            reactor,
            reactor_handle: Mutex::new(None),
        })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn reactor(&self) -> &Arc<EventReactor> {
        &self.reactor
    }

    /// Start reacting to events in the background. Idempotent.
    pub async fn start(&self) {
        let mut handle = self.reactor_handle.lock().await;
        if handle.is_none() {
            *handle = Some(self.reactor.start());
            tracing::debug!("event reactor started");
        }
    }

    /// Stop the reactor after every queued event and its reactions have
    /// been handled.
    pub async fn shutdown(&self) {
        let handle = self.reactor_handle.lock().await.take();
        if let Some(handle) = handle {
            self.reactor.shutdown(handle).await;
        }
        tracing::debug!(
            events_processed = self.reactor.events_processed(),
            handler_failures = self.reactor.handler_failures(),
            "engine stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{
        Actor, BlockVerificationStatus, EvidenceKind, EvidenceRecord, NewBlock, NewPortfolio, StudentProfile,
    };
    use serde_json::json;
    use uuid::Uuid;

    async fn engine_with_portfolio() -> (Engine, Actor, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let engine = Engine::from_pool(pool, &Config::default()).await.unwrap();
        let student = engine
            .portfolios
            .register_student(StudentProfile::new("Engine Student"))
            .await
            .unwrap();
        let owner = Actor::student(student.id.to_string());
        let portfolio = engine
            .portfolios
            .create_portfolio(
                NewPortfolio {
                    student_id: student.id,
                    slug: "engine".into(),
                    title: "Engine".into(),
                    ..Default::default()
                },
                &owner,
            )
            .await
            .unwrap();
        (engine, owner, portfolio.id())
    }

    #[tokio::test]
    async fn test_rating_handler_is_registered() {
        let (engine, _, _) = engine_with_portfolio().await;
        assert_eq!(engine.reactor().handler_names().await, vec!["RatingRecalculationHandler"]);
    }

    #[tokio::test]
    async fn test_ils_change_updates_rating_once_drained() {
        let (engine, owner, portfolio_id) = engine_with_portfolio().await;
        engine.start().await;

        // The owner cannot raise their own level.
        let err = engine.portfolios.set_ils_level(portfolio_id, 9, &owner).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Forbidden);

        engine
            .portfolios
            .set_ils_level(portfolio_id, 9, &Actor::admin("admin-1"))
            .await
            .unwrap();
        engine.shutdown().await;

        let portfolio = engine.portfolios.get(portfolio_id).await.unwrap();
        assert!((portfolio.meta.rating - 30.0).abs() < 1e-9);
        assert!(engine.reactor().events_processed() >= 1);
    }

    #[tokio::test]
    async fn test_platform_certificate_is_auto_verified_end_to_end() {
        let (engine, owner, portfolio_id) = engine_with_portfolio().await;
        let student_id = engine.portfolios.get(portfolio_id).await.unwrap().meta.student_id;
        engine
            .portfolios
            .record_evidence(EvidenceRecord::new(EvidenceKind::Certificate, "cert-77", student_id))
            .await
            .unwrap();

        let content = json!({"title": "Certificate", "issuedBy": "platform", "certificateId": "cert-77"});
        let block = engine
            .blocks
            .add_block(
                portfolio_id,
                NewBlock {
                    block_type: Some("certificates".into()),
                    content: content.as_object().cloned(),
                    ..Default::default()
                },
                &owner,
            )
            .await
            .unwrap();

        assert_eq!(block.verification.status, BlockVerificationStatus::Verified);
        let history = engine.verification.block_history(portfolio_id, &block.id, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].actor_id, None);
        assert!(engine.verification.pending_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (engine, _, _) = engine_with_portfolio().await;
        engine.start().await;
        engine.start().await;
        assert!(engine.reactor().is_running());
        engine.shutdown().await;
        assert!(!engine.reactor().is_running());
    }
}
