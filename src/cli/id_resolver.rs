//! Resolve user-supplied portfolio references.

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::application::Engine;

/// Accept either a portfolio UUID or its slug.
pub async fn resolve_portfolio_id(engine: &Engine, reference: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(id);
    }
    let portfolio = engine
        .migration
        .load_for_read_by_slug(reference)
        .await
        .with_context(|| format!("No portfolio with id or slug '{reference}'"))?;
    Ok(portfolio.id())
}

pub fn parse_student_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid student id: {raw}"))
}
