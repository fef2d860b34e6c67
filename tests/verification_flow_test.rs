mod common;

use common::{fixture, Fixture};
use folio::domain::models::{
    Actor, BlockVerificationStatus, EvidenceKind, EvidenceRecord, NewBlock, PortfolioVerificationStatus,
    VerificationAction,
};
use folio::{ActorType, DomainError, ErrorKind};
use serde_json::{json, Value};

async fn add(fx: &Fixture, id: &str, block_type: &str, content: Value) {
    let request = NewBlock {
        id: Some(id.to_string()),
        block_type: Some(block_type.to_string()),
        content: content.as_object().cloned(),
        ..Default::default()
    };
    fx.engine
        .blocks
        .add_block(fx.portfolio_id, request, &fx.owner)
        .await
        .expect("failed to add block");
}

async fn portfolio_status(fx: &Fixture) -> PortfolioVerificationStatus {
    fx.engine
        .portfolios
        .get(fx.portfolio_id)
        .await
        .unwrap()
        .meta
        .verification
        .status
}

#[tokio::test]
async fn test_request_approve_cycle() {
    let fx = fixture("cycle").await;
    add(&fx, "cert", "certificates", json!({"title": "First place"})).await;
    let verification = &fx.engine.verification;

    let pending = verification
        .request_verification(fx.portfolio_id, "cert", Some("please check".into()), &fx.owner)
        .await
        .unwrap();
    assert_eq!(pending.verification.status, BlockVerificationStatus::Pending);
    assert!(pending.verification.requested_at.is_some());
    assert_eq!(portfolio_status(&fx).await, PortfolioVerificationStatus::Pending);

    let queue = verification.pending_queue().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].pending_blocks, vec!["cert".to_string()]);

    let approved = verification
        .approve_block(fx.portfolio_id, "cert", None, &fx.admin)
        .await
        .unwrap();
    assert_eq!(approved.verification.status, BlockVerificationStatus::Verified);
    assert_eq!(approved.verification.verified_by.as_deref(), Some("admin-1"));

    let portfolio = fx.engine.portfolios.get(fx.portfolio_id).await.unwrap();
    assert_eq!(portfolio.meta.verification.status, PortfolioVerificationStatus::Verified);
    assert_eq!(portfolio.meta.verification.verified_by.as_deref(), Some("admin-1"));
    assert!(verification.pending_queue().await.unwrap().is_empty());

    let history = verification.block_history(fx.portfolio_id, "cert", None).await.unwrap();
    let actions: Vec<VerificationAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![VerificationAction::Approve, VerificationAction::Request]);
}

#[tokio::test]
async fn test_request_rejects_invalid_transitions() {
    let fx = fixture("transitions").await;
    add(&fx, "cert", "certificates", json!({})).await;
    let verification = &fx.engine.verification;

    verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap();
    let err = verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AlreadyPending(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    verification
        .approve_block(fx.portfolio_id, "cert", None, &fx.admin)
        .await
        .unwrap();
    let err = verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AlreadyVerified(_)));
}

#[tokio::test]
async fn test_rejected_block_can_be_requested_again() {
    let fx = fixture("resubmit").await;
    add(&fx, "cert", "certificates", json!({})).await;
    let verification = &fx.engine.verification;

    verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap();
    let rejected = verification
        .reject_block(fx.portfolio_id, "cert", "Scan is unreadable", &fx.admin)
        .await
        .unwrap();
    assert_eq!(rejected.verification.status, BlockVerificationStatus::Rejected);
    assert_eq!(rejected.verification.rejection_reason.as_deref(), Some("Scan is unreadable"));

    // Block rejection never makes the portfolio Rejected.
    assert_eq!(portfolio_status(&fx).await, PortfolioVerificationStatus::Unverified);

    let again = verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap();
    assert_eq!(again.verification.status, BlockVerificationStatus::Pending);
}

#[tokio::test]
async fn test_only_reviewers_approve_and_reject() {
    let fx = fixture("reviewers").await;
    add(&fx, "cert", "certificates", json!({})).await;
    let verification = &fx.engine.verification;

    let err = verification
        .approve_block(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let checker = Actor::new("checker-7", ActorType::External);
    verification
        .approve_block(fx.portfolio_id, "cert", None, &checker)
        .await
        .unwrap();

    // Reviewers may reject without a reason, even an approved block.
    let rejected = verification
        .reject_block(fx.portfolio_id, "cert", "   ", &fx.admin)
        .await
        .unwrap();
    assert_eq!(rejected.verification.status, BlockVerificationStatus::Rejected);
    assert!(rejected.verification.rejection_reason.is_none());

    let history = verification.block_history(fx.portfolio_id, "cert", None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action, VerificationAction::Reject);
}

#[tokio::test]
async fn test_partial_verification_and_portfolio_rejection() {
    let fx = fixture("partial").await;
    add(&fx, "cert", "certificates", json!({})).await;
    add(&fx, "prize", "achievements", json!({})).await;
    add(&fx, "about", "text", json!({"text": "hello"})).await;
    let verification = &fx.engine.verification;

    let requested = verification
        .request_portfolio_verification(fx.portfolio_id, None, &fx.owner)
        .await
        .unwrap();
    let ids: Vec<&str> = requested.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["cert", "prize"]);

    verification
        .approve_block(fx.portfolio_id, "cert", None, &fx.admin)
        .await
        .unwrap();
    assert_eq!(portfolio_status(&fx).await, PortfolioVerificationStatus::PartiallyVerified);

    let rejected = verification
        .reject_portfolio(fx.portfolio_id, "Missing diploma", &fx.admin)
        .await
        .unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].id, "prize");

    let portfolio = fx.engine.portfolios.get(fx.portfolio_id).await.unwrap();
    assert_eq!(portfolio.meta.verification.status, PortfolioVerificationStatus::PartiallyVerified);
    assert_eq!(portfolio.meta.verification.rejection_reason.as_deref(), Some("Missing diploma"));

    let history = verification.portfolio_history(fx.portfolio_id, Some(2)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action, VerificationAction::Reject);
}

#[tokio::test]
async fn test_auto_verify_replaces_request_for_owned_evidence() {
    let fx = fixture("auto").await;
    fx.engine
        .portfolios
        .record_evidence(EvidenceRecord::new(EvidenceKind::OlympiadResult, "olymp-42", fx.student_id).with_score(87.0))
        .await
        .unwrap();

    add(&fx, "olymp", "achievements", json!({"olympiadResultId": "unknown"})).await;
    let block = fx
        .engine
        .blocks
        .update_block(
            fx.portfolio_id,
            "olymp",
            folio::domain::models::BlockPatch {
                content: json!({"olympiadResultId": "olymp-42"}).as_object().cloned(),
                ..Default::default()
            },
            &fx.owner,
        )
        .await
        .unwrap();
    assert_eq!(block.verification.status, BlockVerificationStatus::Unverified);

    let verified = fx
        .engine
        .verification
        .request_verification(fx.portfolio_id, "olymp", None, &fx.owner)
        .await
        .unwrap();
    assert_eq!(verified.verification.status, BlockVerificationStatus::Verified);
    assert_eq!(verified.verification.verified_by.as_deref(), Some("system"));

    let history = fx
        .engine
        .verification
        .block_history(fx.portfolio_id, "olymp", None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, VerificationAction::AutoVerify);
    assert_eq!(history[0].actor_type, ActorType::System);
    assert!(fx.engine.verification.pending_queue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_evidence_of_another_student_is_not_trusted() {
    let fx = fixture("foreign-evidence").await;
    let other = common::register_student(&fx.engine, "Other Student").await;
    fx.engine
        .portfolios
        .record_evidence(EvidenceRecord::new(EvidenceKind::Certificate, "cert-9", other.id))
        .await
        .unwrap();

    add(
        &fx,
        "cert",
        "certificates",
        json!({"issuedBy": "platform", "certificateId": "cert-9"}),
    )
    .await;

    let block = fx
        .engine
        .verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap();
    assert_eq!(block.verification.status, BlockVerificationStatus::Pending);
}

#[tokio::test]
async fn test_history_survives_block_deletion() {
    let fx = fixture("history").await;
    add(&fx, "cert", "certificates", json!({})).await;
    fx.engine
        .verification
        .request_verification(fx.portfolio_id, "cert", None, &fx.owner)
        .await
        .unwrap();
    fx.engine
        .blocks
        .delete_block(fx.portfolio_id, "cert", &fx.owner)
        .await
        .unwrap();

    let history = fx
        .engine
        .verification
        .block_history(fx.portfolio_id, "cert", None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(portfolio_status(&fx).await, PortfolioVerificationStatus::Unverified);
}

#[tokio::test]
async fn test_portfolio_approval_logs_every_block() {
    let fx = fixture("batch-audit").await;
    add(&fx, "cert", "certificates", json!({})).await;
    add(&fx, "prize", "achievements", json!({})).await;
    let verification = &fx.engine.verification;

    verification
        .request_portfolio_verification(fx.portfolio_id, None, &fx.owner)
        .await
        .unwrap();
    let approved = verification
        .approve_portfolio(fx.portfolio_id, None, &fx.admin)
        .await
        .unwrap();
    assert_eq!(approved.len(), 2);

    let history = verification.portfolio_history(fx.portfolio_id, None).await.unwrap();
    let approvals = history
        .iter()
        .filter(|e| e.action == VerificationAction::Approve)
        .count();
    let requests = history
        .iter()
        .filter(|e| e.action == VerificationAction::Request)
        .count();
    assert_eq!((approvals, requests), (2, 2));
    assert_eq!(portfolio_status(&fx).await, PortfolioVerificationStatus::Verified);
}
