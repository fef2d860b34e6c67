//! Common test utilities for integration tests
//!
//! Provides an engine over a fresh in-memory database and fixtures for
//! students, portfolios and legacy sections.

#![allow(dead_code)]

use folio::adapters::sqlite::create_migrated_test_pool;
use folio::domain::models::{Actor, Config, NewPortfolio, Section, StudentProfile};
use folio::Engine;
use serde_json::json;
use uuid::Uuid;

/// A portfolio owned by a freshly registered student.
pub struct Fixture {
    pub engine: Engine,
    pub owner: Actor,
    pub admin: Actor,
    pub student_id: Uuid,
    pub portfolio_id: Uuid,
}

/// Engine over an in-memory database with migrations applied.
pub async fn test_engine() -> Engine {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test pool");
    Engine::from_pool(pool, &Config::default())
        .await
        .expect("failed to build engine")
}

pub async fn register_student(engine: &Engine, name: &str) -> StudentProfile {
    let profile = StudentProfile::new(name)
        .with_email(format!("{}@example.org", name.to_lowercase().replace(' ', ".")))
        .with_phone("+7 912 345-67-89");
    engine
        .portfolios
        .register_student(profile)
        .await
        .expect("failed to register student")
}

/// A student with one empty block-based portfolio under `slug`.
pub async fn fixture(slug: &str) -> Fixture {
    fixture_with_sections(slug, Vec::new()).await
}

/// A student with one portfolio created from legacy sections.
pub async fn fixture_with_sections(slug: &str, sections: Vec<Section>) -> Fixture {
    let engine = test_engine().await;
    let student = register_student(&engine, "Test Student").await;
    let owner = Actor::student(student.id.to_string());
    let portfolio = engine
        .portfolios
        .create_portfolio(
            NewPortfolio {
                student_id: student.id,
                slug: slug.to_string(),
                title: format!("Portfolio {slug}"),
                sections,
                ..Default::default()
            },
            &owner,
        )
        .await
        .expect("failed to create portfolio");

    Fixture {
        engine,
        owner,
        admin: Actor::admin("admin-1"),
        student_id: student.id,
        portfolio_id: portfolio.id(),
    }
}

/// Legacy sections as older portfolios stored them: out of order, one
/// without an id, one with a string body.
pub fn legacy_sections() -> Vec<Section> {
    vec![
        Section::new("projects")
            .with_id("projects")
            .with_title("Projects")
            .with_content(json!({"items": [{"name": "Robot"}]}))
            .with_order(2),
        Section::new("about")
            .with_id("about")
            .with_title("About me")
            .with_content(json!("I like physics"))
            .with_order(0),
        Section::new("olympiads")
            .with_title("Olympiads")
            .with_content(json!({"items": []}))
            .with_order(1),
    ]
}
