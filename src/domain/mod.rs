//! Domain layer for the folio engine
//!
//! This module contains the content model, port traits and domain errors.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ErrorKind};
