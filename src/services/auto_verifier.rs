//! Evidence-based automatic verification.
//!
//! A block qualifies when its content points at something the evidence
//! store can confirm independently: an olympiad result, an assessment, or
//! a certificate issued by the platform itself.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::domain::models::{
    Actor, Block, EvidenceKind, EvidenceLookup, EvidenceReference, PortfolioMeta, VerificationAction,
    VerificationLogEntry, SYSTEM_VERIFIER,
};
use crate::domain::ports::EvidenceStore;

const OLYMPIAD_RESULT_KEY: &str = "olympiadResultId";
const ASSESSMENT_KEYS: [&str; 2] = ["testResultId", "assessmentId"];
const CERTIFICATE_KEY: &str = "certificateId";
const ISSUER_KEY: &str = "issuedBy";
const PLATFORM_ISSUER: &str = "platform";
const CERTIFICATES_TYPE: &str = "certificates";

/// Result of an auto-verification attempt.
///
/// When `verified` is true the block already carries the verified record
/// and `entry` holds the audit entry to append once the block is stored.
#[derive(Debug, Clone)]
pub struct AutoVerifyOutcome {
    pub verified: bool,
    pub block: Block,
    pub entry: Option<VerificationLogEntry>,
}

impl AutoVerifyOutcome {
    fn unchanged(block: Block) -> Self {
        Self {
            verified: false,
            block,
            entry: None,
        }
    }
}

/// Reference ids may be stored as strings or numbers.
fn reference_value(content: &Map<String, Value>, key: &str) -> Option<String> {
    match content.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_platform_certificate(block: &Block) -> bool {
    block.block_type == CERTIFICATES_TYPE && block.content_str(ISSUER_KEY) == Some(PLATFORM_ISSUER)
}

/// The evidence reference named by a block's content, if any.
pub fn evidence_reference(block: &Block) -> Option<EvidenceReference> {
    if let Some(id) = reference_value(&block.content, OLYMPIAD_RESULT_KEY) {
        return Some(EvidenceReference::new(EvidenceKind::OlympiadResult, id));
    }
    if let Some(id) = ASSESSMENT_KEYS
        .iter()
        .find_map(|key| reference_value(&block.content, key))
    {
        return Some(EvidenceReference::new(EvidenceKind::Assessment, id));
    }
    if is_platform_certificate(block) {
        return reference_value(&block.content, CERTIFICATE_KEY)
            .map(|id| EvidenceReference::new(EvidenceKind::Certificate, id));
    }
    None
}

/// Verifies blocks whose evidence reference belongs to the portfolio owner.
pub struct AutoVerifier {
    evidence: Arc<dyn EvidenceStore>,
    enabled: bool,
}

impl AutoVerifier {
    /// Build a verifier over an evidence store. A disabled verifier never
    /// verifies anything.
    pub fn new(evidence: Arc<dyn EvidenceStore>, enabled: bool) -> Self {
        Self { evidence, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True when the block references independently checkable evidence.
    pub fn should_auto_verify(&self, block: &Block, _portfolio: &PortfolioMeta) -> bool {
        self.enabled && (evidence_reference(block).is_some() || is_platform_certificate(block))
    }

    /// Try to confirm the block's reference against the evidence store.
    ///
    /// Not found, held by another student, or a store failure all leave the
    /// block untouched and report `verified: false`.
    pub async fn auto_verify_block(&self, block: Block, portfolio: &PortfolioMeta) -> AutoVerifyOutcome {
        if !self.should_auto_verify(&block, portfolio) {
            return AutoVerifyOutcome::unchanged(block);
        }
        let Some(reference) = evidence_reference(&block) else {
            tracing::debug!(block_id = %block.id, "platform certificate without a certificate id");
            return AutoVerifyOutcome::unchanged(block);
        };

        let record = match self.evidence.lookup(&reference).await {
            Ok(EvidenceLookup::Found(record)) => record,
            Ok(EvidenceLookup::NotFound) => {
                tracing::debug!(
                    block_id = %block.id,
                    kind = reference.kind.as_str(),
                    reference_id = %reference.reference_id,
                    "evidence not found"
                );
                return AutoVerifyOutcome::unchanged(block);
            }
            Err(e) => {
                tracing::warn!(block_id = %block.id, error = %e, "evidence lookup failed");
                return AutoVerifyOutcome::unchanged(block);
            }
        };

        if record.student_id != portfolio.student_id {
            tracing::info!(
                block_id = %block.id,
                portfolio_id = %portfolio.id,
                reference_id = %reference.reference_id,
                "evidence held by another student, not auto-verifying"
            );
            return AutoVerifyOutcome::unchanged(block);
        }

        let mut block = block;
        let note = format!("auto-verified from {} {}", reference.kind.as_str(), reference.reference_id);
        block.verification.mark_verified(SYSTEM_VERIFIER, Some(note), Utc::now());

        let entry = VerificationLogEntry::new(portfolio.id, block.id.clone(), VerificationAction::AutoVerify, &Actor::system())
            .with_metadata(json!({
                "evidenceKind": reference.kind.as_str(),
                "referenceId": reference.reference_id,
                "score": record.score,
            }));

        tracing::info!(
            portfolio_id = %portfolio.id,
            block_id = %block.id,
            action = VerificationAction::AutoVerify.as_str(),
            "block auto-verified"
        );

        AutoVerifyOutcome {
            verified: true,
            block,
            entry: Some(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::models::{ActorType, BlockVerificationStatus, EvidenceRecord, Slug};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct MapEvidence {
        records: Mutex<HashMap<(EvidenceKind, String), EvidenceRecord>>,
    }

    #[async_trait]
    impl EvidenceStore for MapEvidence {
        async fn lookup(&self, reference: &EvidenceReference) -> DomainResult<EvidenceLookup> {
            let records = self.records.lock().unwrap();
            Ok(records
                .get(&(reference.kind, reference.reference_id.clone()))
                .cloned()
                .map_or(EvidenceLookup::NotFound, EvidenceLookup::Found))
        }

        async fn record(&self, record: &EvidenceRecord) -> DomainResult<()> {
            self.records
                .lock()
                .unwrap()
                .insert((record.kind, record.reference_id.clone()), record.clone());
            Ok(())
        }
    }

    fn content(pairs: Value) -> Map<String, Value> {
        pairs.as_object().cloned().unwrap()
    }

    fn meta() -> PortfolioMeta {
        PortfolioMeta::new(Uuid::new_v4(), Slug::parse("auto-folio").unwrap(), "Auto")
    }

    #[test]
    fn test_evidence_reference_detection() {
        let olympiad = Block::new("o", "achievements").with_content(content(json!({"olympiadResultId": 42})));
        assert_eq!(
            evidence_reference(&olympiad),
            Some(EvidenceReference::new(EvidenceKind::OlympiadResult, "42"))
        );

        let test = Block::new("t", "text").with_content(content(json!({"testResultId": "t-1"})));
        assert_eq!(evidence_reference(&test).unwrap().kind, EvidenceKind::Assessment);

        let cert = Block::new("c", "certificates")
            .with_content(content(json!({"issuedBy": "platform", "certificateId": "cert-9"})));
        assert_eq!(evidence_reference(&cert).unwrap().kind, EvidenceKind::Certificate);

        let external = Block::new("e", "certificates")
            .with_content(content(json!({"issuedBy": "someone", "certificateId": "cert-9"})));
        assert!(evidence_reference(&external).is_none());
    }

    #[tokio::test]
    async fn test_platform_certificate_is_verified_by_system() {
        let store = Arc::new(MapEvidence::default());
        let meta = meta();
        store
            .record(&EvidenceRecord::new(EvidenceKind::Certificate, "cert-9", meta.student_id))
            .await
            .unwrap();
        let verifier = AutoVerifier::new(store, true);

        let block = Block::new("c", "certificates")
            .with_content(content(json!({"issuedBy": "platform", "certificateId": "cert-9"})));
        let outcome = verifier.auto_verify_block(block, &meta).await;

        assert!(outcome.verified);
        assert_eq!(outcome.block.verification.status, BlockVerificationStatus::Verified);
        assert_eq!(outcome.block.verification.verified_by.as_deref(), Some(SYSTEM_VERIFIER));
        assert!(outcome.block.verification.requested_at.is_none());
        let entry = outcome.entry.unwrap();
        assert_eq!(entry.action, VerificationAction::AutoVerify);
        assert_eq!(entry.actor_type, ActorType::System);
        assert!(entry.actor_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_or_foreign_evidence_leaves_block_untouched() {
        let store = Arc::new(MapEvidence::default());
        let meta = meta();
        store
            .record(&EvidenceRecord::new(EvidenceKind::OlympiadResult, "other", Uuid::new_v4()))
            .await
            .unwrap();
        let verifier = AutoVerifier::new(store, true);

        let unknown = Block::new("a", "achievements").with_content(content(json!({"olympiadResultId": "nope"})));
        let outcome = verifier.auto_verify_block(unknown.clone(), &meta).await;
        assert!(!outcome.verified);
        assert_eq!(outcome.block, unknown);

        let foreign = Block::new("b", "achievements").with_content(content(json!({"olympiadResultId": "other"})));
        let outcome = verifier.auto_verify_block(foreign, &meta).await;
        assert!(!outcome.verified);
        assert!(outcome.entry.is_none());
    }

    #[tokio::test]
    async fn test_disabled_verifier_never_qualifies() {
        let verifier = AutoVerifier::new(Arc::new(MapEvidence::default()), false);
        let block = Block::new("c", "certificates").with_content(content(json!({"issuedBy": "platform"})));
        assert!(!verifier.should_auto_verify(&block, &meta()));
    }
}
