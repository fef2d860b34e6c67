//! Folio - student portfolio content and verification engine
//!
//! Folio stores student portfolios as ordered content blocks, migrates
//! legacy section-based portfolios on first touch, runs per-block and
//! portfolio-level verification with an audit trail, auto-verifies blocks
//! backed by platform evidence, projects portfolios per audience and keeps
//! a rating in step with verification and content changes.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain Layer** (`domain`): models, errors and the ports services depend on
//! - **Service Layer** (`services`): migration, block and verification operations, projection, rating, events
//! - **Adapters** (`adapters`): SQLite implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and project setup
//! - **Application Layer** (`application`): the wired [`Engine`]
//! - **CLI Layer** (`cli`): the `folio` command line
//!
//! # Example
//!
//! ```ignore
//! use folio::{ConfigLoader, Engine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let engine = Engine::open(&config).await?;
//!     engine.start().await;
//!     let queue = engine.verification.pending_queue().await?;
//!     println!("{} portfolio(s) awaiting review", queue.len());
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::Engine;
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    Actor, ActorType, Block, BlockVerificationStatus, Config, Layout, Portfolio, PortfolioVerificationStatus,
    Section, VerificationAction, VerificationLogEntry,
};
pub use domain::ports::{EditabilityGuard, EvidenceStore, PortfolioRepository, VerificationLogRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ensure_blocks_structure, PortfolioView, ViewerRole};
