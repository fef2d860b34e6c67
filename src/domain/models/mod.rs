//! Domain models.

pub mod actor;
pub mod block;
pub mod config;
pub mod evidence;
pub mod layout;
pub mod lenient;
pub mod portfolio;
pub mod section;
pub mod student;
pub mod verification;

pub use actor::{Actor, ActorType};
pub use block::{Block, BlockOrder, BlockPatch, BlockVisibility, NewBlock, StoredBlock};
pub use config::{Config, DatabaseConfig, EventsConfig, LoggingConfig, RatingWeights, VerificationConfig};
pub use evidence::{EvidenceKind, EvidenceLookup, EvidenceRecord, EvidenceReference, RatingSignals};
pub use layout::{Layout, LayoutType, StoredBlockLayout, StoredLayout};
pub use portfolio::{
    NewPortfolio, Portfolio, PortfolioDocument, PortfolioMeta, PortfolioVisibility, PublicationStatus, Slug,
};
pub use section::Section;
pub use student::{StudentProfile, StudentSummary};
pub use verification::{
    BlockVerification, BlockVerificationStatus, PortfolioVerification, PortfolioVerificationStatus,
    VerificationAction, VerificationLogEntry, VerificationPatch, SYSTEM_VERIFIER,
};
