//! Verification domain model.
//!
//! Blocks carry their own verification sub-record; the portfolio-level
//! status is derived from the verification-required blocks and never set
//! independently of that derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lenient;
use super::actor::{Actor, ActorType};
use super::block::Block;

/// Identity recorded as verifier for system-performed verification.
pub const SYSTEM_VERIFIER: &str = "system";

/// Block types whose verification state feeds the portfolio-level status.
pub const VERIFICATION_REQUIRED_TYPES: [&str; 2] = ["certificates", "achievements"];

/// Whether a block type participates in portfolio-level verification.
pub fn requires_verification(block_type: &str) -> bool {
    VERIFICATION_REQUIRED_TYPES.contains(&block_type)
}

/// Verification status of a single block.
///
/// `Verified` and `Rejected` are not terminal: a new request reopens the
/// block into `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockVerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
    Rejected,
}

impl BlockVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unverified" => Some(Self::Unverified),
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Fully-populated verification sub-record of a block.
///
/// Every field is always serialized; absent values appear as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockVerification {
    pub status: BlockVerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub rejection_reason: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
}

impl BlockVerification {
    /// Move into `Pending`, clearing the outcome of any previous review.
    pub fn mark_requested(&mut self, note: Option<String>, at: DateTime<Utc>) {
        self.status = BlockVerificationStatus::Pending;
        self.requested_at = Some(at);
        self.verified_by = None;
        self.verified_at = None;
        self.rejection_reason = None;
        if note.is_some() {
            self.note = note;
        }
    }

    /// Move to verified, clearing any earlier rejection.
    pub fn mark_verified(&mut self, verifier: impl Into<String>, note: Option<String>, at: DateTime<Utc>) {
        self.status = BlockVerificationStatus::Verified;
        self.verified_by = Some(verifier.into());
        self.verified_at = Some(at);
        self.rejection_reason = None;
        if note.is_some() {
            self.note = note;
        }
    }

    /// Move to rejected with an optional reason.
    pub fn mark_rejected(&mut self, reviewer: impl Into<String>, reason: Option<String>, at: DateTime<Utc>) {
        self.status = BlockVerificationStatus::Rejected;
        self.verified_by = Some(reviewer.into());
        self.verified_at = Some(at);
        self.rejection_reason = reason;
    }

    /// Shallow-merge a partial update; untouched fields keep their values.
    pub fn merge(&mut self, patch: VerificationPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(verified_by) = patch.verified_by {
            self.verified_by = Some(verified_by);
        }
        if let Some(verified_at) = patch.verified_at {
            self.verified_at = Some(verified_at);
        }
        if let Some(note) = patch.note {
            self.note = Some(note);
        }
        if let Some(reason) = patch.rejection_reason {
            self.rejection_reason = Some(reason);
        }
        if let Some(requested_at) = patch.requested_at {
            self.requested_at = Some(requested_at);
        }
    }
}

/// Partial verification update used by block updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationPatch {
    pub status: Option<BlockVerificationStatus>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub rejection_reason: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
}

/// Verification sub-record as found in raw storage. Any field may be
/// missing or malformed; normalization fills defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredVerification {
    #[serde(deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub verified_by: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub verified_at: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub note: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub rejection_reason: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub requested_at: Option<String>,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<StoredVerification> for BlockVerification {
    fn from(stored: StoredVerification) -> Self {
        Self {
            status: stored
                .status
                .as_deref()
                .and_then(BlockVerificationStatus::from_str)
                .unwrap_or_default(),
            verified_at: parse_timestamp(stored.verified_at.as_deref()),
            requested_at: parse_timestamp(stored.requested_at.as_deref()),
            verified_by: stored.verified_by,
            note: stored.note,
            rejection_reason: stored.rejection_reason,
        }
    }
}

/// Portfolio-level verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortfolioVerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
    Rejected,
    PartiallyVerified,
}

impl PortfolioVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::PartiallyVerified => "partially-verified",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unverified" => Some(Self::Unverified),
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            "partially-verified" | "partially_verified" => Some(Self::PartiallyVerified),
            _ => None,
        }
    }

    /// Derive the portfolio status from its blocks.
    ///
    /// Rejected-only required blocks resolve to `Unverified`; block
    /// rejection never promotes to a portfolio-level `Rejected`.
    pub fn derive(blocks: &[Block]) -> Self {
        let required: Vec<&Block> = blocks.iter().filter(|b| b.requires_verification()).collect();
        if required.is_empty() {
            return Self::Unverified;
        }

        let count = |status: BlockVerificationStatus| {
            required.iter().filter(|b| b.verification.status == status).count()
        };
        let verified = count(BlockVerificationStatus::Verified);
        let pending = count(BlockVerificationStatus::Pending);

        if verified == required.len() {
            Self::Verified
        } else if verified > 0 {
            Self::PartiallyVerified
        } else if pending > 0 {
            Self::Pending
        } else {
            Self::Unverified
        }
    }
}

/// Portfolio-level verification record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioVerification {
    pub status: PortfolioVerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl PortfolioVerification {
    /// Re-derive the status from `blocks`, keeping the verifier fields
    /// consistent with the new status. `actor` is the identity that caused
    /// the change, if any.
    pub fn rederive(&self, blocks: &[Block], actor: Option<&str>, at: DateTime<Utc>) -> Self {
        let status = PortfolioVerificationStatus::derive(blocks);
        let mut next = self.clone();
        next.status = status;
        if status == PortfolioVerificationStatus::Verified {
            if self.status != PortfolioVerificationStatus::Verified || next.verified_by.is_none() {
                next.verified_by = Some(actor.unwrap_or(SYSTEM_VERIFIER).to_string());
                next.verified_at = Some(at);
            }
            next.rejection_reason = None;
        } else {
            next.verified_by = None;
            next.verified_at = None;
        }
        next
    }
}

/// Action recorded in the verification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationAction {
    Request,
    Approve,
    Reject,
    AutoVerify,
}

impl VerificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::AutoVerify => "auto-verify",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "auto-verify" => Some(Self::AutoVerify),
            _ => None,
        }
    }
}

/// Append-only audit record of a verification transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationLogEntry {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub block_id: String,
    pub action: VerificationAction,
    /// `None` for system-performed transitions.
    pub actor_id: Option<String>,
    pub actor_type: ActorType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl VerificationLogEntry {
    pub fn new(portfolio_id: Uuid, block_id: impl Into<String>, action: VerificationAction, actor: &Actor) -> Self {
        let actor_id = if actor.actor_type == ActorType::System {
            None
        } else {
            Some(actor.id.clone())
        };
        Self {
            id: Uuid::new_v4(),
            portfolio_id,
            block_id: block_id.into(),
            action,
            actor_id,
            actor_type: actor.actor_type,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::block::Block;

    fn block(block_type: &str, status: BlockVerificationStatus) -> Block {
        let mut b = Block::new(format!("b-{block_type}-{}", status.as_str()), block_type);
        b.verification.status = status;
        b
    }

    #[test]
    fn test_derive_no_required_blocks() {
        let blocks = vec![block("text", BlockVerificationStatus::Verified)];
        assert_eq!(PortfolioVerificationStatus::derive(&blocks), PortfolioVerificationStatus::Unverified);
        assert_eq!(PortfolioVerificationStatus::derive(&[]), PortfolioVerificationStatus::Unverified);
    }

    #[test]
    fn test_derive_all_verified() {
        let blocks = vec![
            block("certificates", BlockVerificationStatus::Verified),
            block("achievements", BlockVerificationStatus::Verified),
            block("text", BlockVerificationStatus::Unverified),
        ];
        assert_eq!(PortfolioVerificationStatus::derive(&blocks), PortfolioVerificationStatus::Verified);
    }

    #[test]
    fn test_derive_partial_and_pending() {
        let partial = vec![
            block("certificates", BlockVerificationStatus::Verified),
            block("achievements", BlockVerificationStatus::Pending),
        ];
        assert_eq!(
            PortfolioVerificationStatus::derive(&partial),
            PortfolioVerificationStatus::PartiallyVerified
        );

        let pending = vec![
            block("certificates", BlockVerificationStatus::Rejected),
            block("achievements", BlockVerificationStatus::Pending),
        ];
        assert_eq!(PortfolioVerificationStatus::derive(&pending), PortfolioVerificationStatus::Pending);
    }

    #[test]
    fn test_derive_rejected_only_is_unverified() {
        let blocks = vec![block("certificates", BlockVerificationStatus::Rejected)];
        assert_eq!(PortfolioVerificationStatus::derive(&blocks), PortfolioVerificationStatus::Unverified);
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let mut v = BlockVerification {
            status: BlockVerificationStatus::Pending,
            note: Some("please check".into()),
            requested_at: Some(Utc::now()),
            ..Default::default()
        };
        v.merge(VerificationPatch {
            verified_by: Some("admin-1".into()),
            ..Default::default()
        });
        assert_eq!(v.status, BlockVerificationStatus::Pending);
        assert_eq!(v.note.as_deref(), Some("please check"));
        assert_eq!(v.verified_by.as_deref(), Some("admin-1"));
        assert!(v.requested_at.is_some());
    }

    #[test]
    fn test_stored_verification_defaults() {
        let stored = StoredVerification {
            status: Some("bogus".into()),
            verified_at: Some("not a date".into()),
            ..Default::default()
        };
        let v: BlockVerification = stored.into();
        assert_eq!(v.status, BlockVerificationStatus::Unverified);
        assert!(v.verified_at.is_none());
    }

    #[test]
    fn test_serialization_keeps_all_fields() {
        let json = serde_json::to_value(BlockVerification::default()).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["status", "verifiedBy", "verifiedAt", "note", "rejectionReason", "requestedAt"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_rederive_sets_and_clears_verifier() {
        let now = Utc::now();
        let verified = vec![block("certificates", BlockVerificationStatus::Verified)];
        let record = PortfolioVerification::default().rederive(&verified, Some("admin-7"), now);
        assert_eq!(record.status, PortfolioVerificationStatus::Verified);
        assert_eq!(record.verified_by.as_deref(), Some("admin-7"));

        let pending = vec![block("certificates", BlockVerificationStatus::Pending)];
        let record = record.rederive(&pending, None, now);
        assert_eq!(record.status, PortfolioVerificationStatus::Pending);
        assert!(record.verified_by.is_none());
    }
}
