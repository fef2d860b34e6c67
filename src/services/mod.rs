//! Service layer: the engine's operations over the domain model.

pub mod auto_verifier;
pub mod block_service;
pub mod builtin_handlers;
pub mod contact_scrubber;
pub mod event_bus;
pub mod event_reactor;
pub mod layout_migration;
pub mod portfolio_service;
pub mod rating_engine;
pub mod rating_service;
pub mod verification_service;
pub mod visibility;

pub use auto_verifier::{evidence_reference, AutoVerifier, AutoVerifyOutcome};
pub use block_service::{content_object, BlockService};
pub use builtin_handlers::RatingRecalculationHandler;
pub use contact_scrubber::ContactScrubber;
pub use event_bus::{
    DomainEvent, EventBus, EventBusConfig, EventCategory, EventId, EventPayload, EventSeverity, SequenceNumber,
};
pub use event_reactor::{
    EventFilter, EventHandler, EventReactor, HandlerContext, HandlerId, HandlerMetadata, HandlerPriority, Reaction,
    ReactorConfig,
};
pub use layout_migration::{ensure_blocks_structure, needs_migration, MigrationService, MigrationSummary};
pub use portfolio_service::PortfolioService;
pub use rating_engine::{RatingComponents, RatingEngine};
pub use rating_service::RatingService;
pub use verification_service::{QueueEntry, VerificationService};
pub use visibility::{PortfolioView, ViewerRole, VisibilityProjector};
