//! Audience-scoped projections of portfolios and blocks.
//!
//! Owners see everything. Everyone else sees public, non-rejected blocks
//! with a reduced verification record, and a portfolio stripped of
//! personal details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::models::{
    Actor, ActorType, Block, BlockVerification, BlockVerificationStatus, BlockVisibility, LayoutType, Portfolio,
    PortfolioVerification, PortfolioVerificationStatus, PortfolioVisibility, PublicationStatus, StudentProfile,
    StudentSummary,
};
use crate::services::contact_scrubber::ContactScrubber;

/// Keys removed from hero and theme settings for non-owners.
const CONTACT_KEYS: [&str; 4] = ["email", "phone", "contacts", "address"];
/// Block content fields holding free text that gets scrubbed.
const FREE_TEXT_KEYS: [&str; 3] = ["about", "description", "text"];

/// Role of whoever is looking at a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerRole {
    Anonymous,
    Student,
    Admin,
    External,
}

impl ViewerRole {
    pub fn of(viewer: Option<&Actor>) -> Self {
        match viewer.map(|a| a.actor_type) {
            None => Self::Anonymous,
            Some(ActorType::Student) => Self::Student,
            Some(ActorType::Admin | ActorType::System) => Self::Admin,
            Some(ActorType::External) => Self::External,
        }
    }
}

/// Verification fields visible to non-owners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicVerification {
    pub status: BlockVerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub requested_at: Option<DateTime<Utc>>,
}

impl From<&BlockVerification> for PublicVerification {
    fn from(v: &BlockVerification) -> Self {
        Self {
            status: v.status,
            verified_by: v.verified_by.clone(),
            verified_at: v.verified_at,
            requested_at: v.requested_at,
        }
    }
}

/// Block verification, full or stripped to its public fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VerificationView {
    Full(BlockVerification),
    Public(PublicVerification),
}

impl VerificationView {
    pub fn status(&self) -> BlockVerificationStatus {
        match self {
            Self::Full(v) => v.status,
            Self::Public(v) => v.status,
        }
    }
}

/// A block as served to one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: Map<String, Value>,
    pub style_config: Value,
    pub visibility: BlockVisibility,
    pub order: u32,
    pub verification: VerificationView,
}

impl BlockView {
    fn full(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            block_type: block.block_type.clone(),
            content: block.content.clone(),
            style_config: block.style_config.clone(),
            visibility: block.visibility,
            order: block.order,
            verification: VerificationView::Full(block.verification.clone()),
        }
    }

    fn public(block: &Block) -> Self {
        Self {
            verification: VerificationView::Public(PublicVerification::from(&block.verification)),
            ..Self::full(block)
        }
    }
}

/// Whether a non-owner may see this block at all.
fn publicly_visible(block: &Block) -> bool {
    block.visibility == BlockVisibility::Public && block.verification.status != BlockVerificationStatus::Rejected
}

/// Filter blocks for a viewer. Owners get every block with full
/// verification detail; others get public, non-rejected blocks with the
/// reduced verification record.
pub fn filter_blocks_by_visibility(blocks: &[Block], _viewer_role: ViewerRole, is_owner: bool) -> Vec<BlockView> {
    if is_owner {
        return blocks.iter().map(BlockView::full).collect();
    }
    blocks
        .iter()
        .filter(|b| publicly_visible(b))
        .map(BlockView::public)
        .collect()
}

/// Owner profile, full or summarized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StudentView {
    Full(StudentProfile),
    Summary(StudentSummary),
}

impl StudentView {
    pub fn name(&self) -> &str {
        match self {
            Self::Full(profile) => &profile.name,
            Self::Summary(summary) => &summary.name,
        }
    }
}

/// Portfolio verification without reviewer notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPortfolioVerification {
    pub status: PortfolioVerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Portfolio verification, full or public.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortfolioVerificationView {
    Full(PortfolioVerification),
    Public(PublicPortfolioVerification),
}

impl PortfolioVerificationView {
    pub fn status(&self) -> PortfolioVerificationStatus {
        match self {
            Self::Full(v) => v.status,
            Self::Public(v) => v.status,
        }
    }
}

/// Projected layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutView {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    pub blocks: Vec<BlockView>,
}

/// A portfolio as served to one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub visibility: PortfolioVisibility,
    pub status: PublicationStatus,
    pub theme: Value,
    pub hero: Value,
    pub animations: Value,
    pub verification: PortfolioVerificationView,
    pub ils_level: u8,
    pub rating: f64,
    pub layout: LayoutView,
    pub student: Option<StudentView>,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remove contact keys at any depth.
fn strip_contact_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !CONTACT_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), strip_contact_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_contact_keys).collect()),
        other => other.clone(),
    }
}

/// Turns a portfolio into the view a given viewer may see.
#[derive(Debug, Clone)]
pub struct VisibilityProjector {
    scrubber: ContactScrubber,
}

impl VisibilityProjector {
    pub fn new(scrubber: ContactScrubber) -> Self {
        Self { scrubber }
    }

    fn scrub_content(&self, content: &mut Map<String, Value>) {
        for key in FREE_TEXT_KEYS {
            if let Some(Value::String(text)) = content.get_mut(key) {
                *text = self.scrubber.scrub(text);
            }
        }
    }

    /// Project a whole portfolio for `viewer`. Owners and admins get the
    /// full view; others get filtered blocks, the student's id and name,
    /// and contact details removed or scrubbed.
    pub fn project_portfolio(
        &self,
        portfolio: &Portfolio,
        profile: Option<&StudentProfile>,
        viewer: Option<&Actor>,
    ) -> PortfolioView {
        let role = ViewerRole::of(viewer);
        let is_owner = viewer.is_some_and(|a| portfolio.meta.is_owned_by(&a.id));
        let full = is_owner || role == ViewerRole::Admin;
        let meta = &portfolio.meta;

        if full {
            return PortfolioView {
                id: meta.id,
                slug: meta.slug.to_string(),
                title: meta.title.clone(),
                visibility: meta.visibility,
                status: meta.status,
                theme: meta.theme.clone(),
                hero: meta.hero.clone(),
                animations: meta.animations.clone(),
                verification: PortfolioVerificationView::Full(meta.verification.clone()),
                ils_level: meta.ils_level,
                rating: meta.rating,
                layout: LayoutView {
                    layout_type: portfolio.layout.layout_type,
                    blocks: filter_blocks_by_visibility(&portfolio.layout.blocks, role, true),
                },
                student: profile.cloned().map(StudentView::Full),
                is_owner,
                created_at: meta.created_at,
                updated_at: meta.updated_at,
            };
        }

        let mut blocks = filter_blocks_by_visibility(&portfolio.layout.blocks, role, false);
        for block in &mut blocks {
            self.scrub_content(&mut block.content);
        }

        PortfolioView {
            id: meta.id,
            slug: meta.slug.to_string(),
            title: meta.title.clone(),
            visibility: meta.visibility,
            status: meta.status,
            theme: strip_contact_keys(&meta.theme),
            hero: strip_contact_keys(&meta.hero),
            animations: meta.animations.clone(),
            verification: PortfolioVerificationView::Public(PublicPortfolioVerification {
                status: meta.verification.status,
                verified_by: meta.verification.verified_by.clone(),
                verified_at: meta.verification.verified_at,
            }),
            ils_level: meta.ils_level,
            rating: meta.rating,
            layout: LayoutView {
                layout_type: portfolio.layout.layout_type,
                blocks,
            },
            student: profile.map(|p| StudentView::Summary(p.summary())),
            is_owner: false,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}
