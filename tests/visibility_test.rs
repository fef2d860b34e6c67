mod common;

use common::fixture;
use folio::domain::models::{
    Actor, Block, BlockVerificationStatus, BlockVisibility, NewBlock, PortfolioVisibility,
};
use folio::services::visibility::{filter_blocks_by_visibility, StudentView, VerificationView};
use folio::{ErrorKind, ViewerRole};
use proptest::prelude::*;
use serde_json::json;

fn arb_block() -> impl Strategy<Value = Block> {
    (
        "[a-z]{1,6}",
        prop::sample::select(vec!["text", "certificates", "achievements", "projects"]),
        prop::bool::ANY,
        prop::sample::select(vec![
            BlockVerificationStatus::Unverified,
            BlockVerificationStatus::Pending,
            BlockVerificationStatus::Verified,
            BlockVerificationStatus::Rejected,
        ]),
    )
        .prop_map(|(id, block_type, private, status)| {
            let mut block = Block::new(id, block_type);
            if private {
                block.visibility = BlockVisibility::Private;
            }
            block.verification.status = status;
            if status == BlockVerificationStatus::Rejected {
                block.verification.rejection_reason = Some("not legible".into());
            }
            block
        })
}

proptest! {
    /// Property: non-owners never see private or rejected blocks, nor
    /// rejection reasons
    #[test]
    fn prop_public_projection_hides_private_and_rejected(blocks in prop::collection::vec(arb_block(), 0..20)) {
        let views = filter_blocks_by_visibility(&blocks, ViewerRole::Anonymous, false);
        let expected = blocks
            .iter()
            .filter(|b| {
                b.visibility == BlockVisibility::Public
                    && b.verification.status != BlockVerificationStatus::Rejected
            })
            .count();
        prop_assert_eq!(views.len(), expected);

        for view in &views {
            prop_assert_eq!(view.visibility, BlockVisibility::Public);
            prop_assert!(matches!(view.verification, VerificationView::Public(_)));
            let serialized = serde_json::to_string(view).unwrap();
            prop_assert!(!serialized.contains("rejectionReason"));
        }
    }

    /// Property: owners see every block, in order, with full detail
    #[test]
    fn prop_owner_projection_is_complete(blocks in prop::collection::vec(arb_block(), 0..20)) {
        let views = filter_blocks_by_visibility(&blocks, ViewerRole::Student, true);
        prop_assert_eq!(views.len(), blocks.len());
        for (view, block) in views.iter().zip(&blocks) {
            prop_assert_eq!(&view.id, &block.id);
            prop_assert!(matches!(view.verification, VerificationView::Full(_)));
        }
    }
}

#[tokio::test]
async fn test_anonymous_view_scrubs_contacts() {
    let fx = fixture("public-view").await;
    let engine = &fx.engine;

    let about = NewBlock {
        id: Some("about".into()),
        block_type: Some("text".into()),
        content: json!({"text": "Write to me at student@example.org or call +7 912 345-67-89"})
            .as_object()
            .cloned(),
        ..Default::default()
    };
    engine.blocks.add_block(fx.portfolio_id, about, &fx.owner).await.unwrap();
    let secret = NewBlock {
        id: Some("diary".into()),
        block_type: Some("text".into()),
        visibility: Some(BlockVisibility::Private),
        ..Default::default()
    };
    engine.blocks.add_block(fx.portfolio_id, secret, &fx.owner).await.unwrap();
    engine.portfolios.publish(fx.portfolio_id, &fx.owner).await.unwrap();

    let view = engine.portfolios.view_by_slug("public-view", None).await.unwrap();
    assert!(!view.is_owner);
    assert_eq!(view.layout.blocks.len(), 1);
    let text = view.layout.blocks[0].content["text"].as_str().unwrap();
    assert!(!text.contains("student@example.org"));
    assert!(!text.contains("345-67-89"));

    match view.student {
        Some(StudentView::Summary(ref summary)) => assert_eq!(summary.id, fx.student_id),
        ref other => panic!("expected a student summary, got {other:?}"),
    }
    let serialized = serde_json::to_string(&view).unwrap();
    assert!(!serialized.contains("example.org"));
}

#[tokio::test]
async fn test_owner_view_is_unfiltered() {
    let fx = fixture("owner-view").await;
    let secret = NewBlock {
        id: Some("diary".into()),
        block_type: Some("text".into()),
        visibility: Some(BlockVisibility::Private),
        ..Default::default()
    };
    fx.engine
        .blocks
        .add_block(fx.portfolio_id, secret, &fx.owner)
        .await
        .unwrap();

    // Drafts are readable by their owner.
    let view = fx
        .engine
        .portfolios
        .view_by_slug("owner-view", Some(&fx.owner))
        .await
        .unwrap();
    assert!(view.is_owner);
    assert_eq!(view.layout.blocks.len(), 1);
    assert!(matches!(view.student, Some(StudentView::Full(_))));
}

#[tokio::test]
async fn test_drafts_and_private_portfolios_are_forbidden_to_others() {
    let fx = fixture("hidden").await;
    let stranger = Actor::student("stranger");

    let err = fx.engine.portfolios.view_by_slug("hidden", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    fx.engine.portfolios.publish(fx.portfolio_id, &fx.owner).await.unwrap();
    fx.engine
        .portfolios
        .set_visibility(fx.portfolio_id, PortfolioVisibility::Private, &fx.owner)
        .await
        .unwrap();
    let err = fx
        .engine
        .portfolios
        .view_by_slug("hidden", Some(&stranger))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Admins see everything.
    let view = fx
        .engine
        .portfolios
        .view_by_slug("hidden", Some(&fx.admin))
        .await
        .unwrap();
    assert!(!view.is_owner);
    assert!(matches!(view.student, Some(StudentView::Full(_))));

    let err = fx.engine.portfolios.view_by_slug("nope", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
