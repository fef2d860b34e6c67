//! Portfolio domain model.
//!
//! A portfolio exists in two shapes: [`PortfolioDocument`], the raw stored
//! form whose layout may still be a legacy string, and [`Portfolio`], the
//! normalized form every core operation works on. Only the migration
//! engine converts between them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::layout::{Layout, StoredLayout};
use super::section::Section;
use super::verification::PortfolioVerification;
use crate::domain::errors::{DomainError, DomainResult};

/// Lowest ILS level.
pub const MIN_ILS_LEVEL: u8 = 1;
/// Highest ILS level.
pub const MAX_ILS_LEVEL: u8 = 9;

/// Globally unique, human-readable portfolio address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validate a slug: 3-50 lowercase letters, digits or hyphens.
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        if !(3..=50).contains(&raw.len()) {
            return Err(DomainError::ValidationFailed(format!(
                "slug must be 3-50 characters, got {}",
                raw.len()
            )));
        }
        if !raw.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(DomainError::ValidationFailed(format!(
                "slug may only contain lowercase letters, digits and hyphens: {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate an ILS level.
pub fn validate_ils_level(level: u8) -> DomainResult<u8> {
    if (MIN_ILS_LEVEL..=MAX_ILS_LEVEL).contains(&level) {
        Ok(level)
    } else {
        Err(DomainError::ValidationFailed(format!(
            "ILS level must be between {MIN_ILS_LEVEL} and {MAX_ILS_LEVEL}, got {level}"
        )))
    }
}

/// Who may open a published portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioVisibility {
    #[default]
    Public,
    Private,
    Unlisted,
}

impl PortfolioVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Unlisted => "unlisted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "unlisted" => Some(Self::Unlisted),
            _ => None,
        }
    }
}

/// Draft portfolios are visible to their owner and admins only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// Scalar header shared by the stored and normalized portfolio shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMeta {
    pub id: Uuid,
    pub student_id: Uuid,
    pub slug: Slug,
    pub title: String,
    pub visibility: PortfolioVisibility,
    pub status: PublicationStatus,
    /// Theme, hero and animation settings are opaque to the engine.
    pub theme: Value,
    pub hero: Value,
    pub animations: Value,
    pub verification: PortfolioVerification,
    pub ils_level: u8,
    pub rating: f64,
    /// Optimistic concurrency token, bumped on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioMeta {
    pub fn new(student_id: Uuid, slug: Slug, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            student_id,
            slug,
            title: title.into(),
            visibility: PortfolioVisibility::default(),
            status: PublicationStatus::default(),
            theme: Value::Object(Map::new()),
            hero: Value::Object(Map::new()),
            animations: Value::Object(Map::new()),
            verification: PortfolioVerification::default(),
            ils_level: MIN_ILS_LEVEL,
            rating: 0.0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the actor id is the owning student's id.
    pub fn is_owned_by(&self, actor_id: &str) -> bool {
        self.student_id.to_string() == actor_id
    }
}

/// Raw stored portfolio. The layout may be legacy, missing, or carry
/// partially-populated blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDocument {
    #[serde(flatten)]
    pub meta: PortfolioMeta,
    pub layout: Option<StoredLayout>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl PortfolioDocument {
    pub fn new(meta: PortfolioMeta) -> Self {
        Self {
            meta,
            layout: None,
            sections: Vec::new(),
        }
    }

    pub fn with_layout(mut self, layout: StoredLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }
}

/// Normalized portfolio: the layout is always `{type, blocks}` and every
/// block carries a complete verification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(flatten)]
    pub meta: PortfolioMeta,
    pub layout: Layout,
    pub sections: Vec<Section>,
}

impl Portfolio {
    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    /// Stored shape of this portfolio, as the repository writes it.
    pub fn to_document(&self) -> DomainResult<PortfolioDocument> {
        let layout: StoredLayout = serde_json::from_value(serde_json::to_value(&self.layout)?)?;
        Ok(PortfolioDocument {
            meta: self.meta.clone(),
            layout: Some(layout),
            sections: self.sections.clone(),
        })
    }
}

/// Input for creating a portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPortfolio {
    pub student_id: Uuid,
    pub slug: String,
    pub title: String,
    pub visibility: Option<PortfolioVisibility>,
    pub theme: Option<Value>,
    pub hero: Option<Value>,
    pub animations: Option<Value>,
    /// Legacy sections imported as-is; they are migrated on first touch.
    pub sections: Vec<Section>,
}
