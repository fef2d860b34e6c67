//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - PortfolioRepository: portfolio document persistence
//! - VerificationLogRepository: append-only verification audit sink
//! - EvidenceStore / RatingSignalSource: external evidence and rating inputs
//! - StudentRepository: student profiles
//! - EditabilityGuard: ownership/editability veto
pub mod editability;
pub mod evidence_store;
pub mod portfolio_repository;
pub mod student_repository;
pub mod verification_log_repository;

pub use editability::{EditabilityGuard, OwnershipGuard};
pub use evidence_store::{EvidenceStore, RatingSignalSource};
pub use portfolio_repository::{PortfolioFilter, PortfolioRepository};
pub use student_repository::StudentRepository;
pub use verification_log_repository::VerificationLogRepository;
