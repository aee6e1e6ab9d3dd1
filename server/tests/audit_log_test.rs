//! Moderation log integration tests over the in-memory store.
//!
//! Run with: `cargo test --test audit_log_test`

mod helpers;

use helpers::{actor_with_tier, TestApp};
use portal_server::audit::{
    self, rehash, verify_chain, ActionType, ChainBreakKind, LogFilter, TargetType, GENESIS_HASH,
};
use portal_server::moderation::{categories, posts, users};
use portal_server::moderation::types::{CreateCategoryRequest, MoveDirection};
use portal_server::moderation::ModerationError;
use portal_server::permissions::RoleTier;
use portal_server::store::ModerationStore;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

/// Run a mixed workload of successful, no-op and rejected transitions.
///
/// Returns the number of transitions that should have been audited.
async fn mixed_workload(app: &TestApp) -> usize {
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let moderator = actor_with_tier(RoleTier::Moderator);
    let store = app.store.as_ref();
    let post = app.post(Uuid::now_v7()).await;
    let target = app.user(RoleTier::None).await;
    let mut audited = 0;

    // Audited
    posts::toggle_hidden(store, &moderator, post.id).await.unwrap();
    posts::soft_delete(store, &admin, post.id, Some("off-topic".to_string()))
        .await
        .unwrap();
    users::ban(store, &admin, target.id, "spam").await.unwrap();
    let root = categories::create_category(
        store,
        &admin,
        CreateCategoryRequest {
            name: "General".to_string(),
            slug: "general".to_string(),
            parent_id: None,
            description: None,
        },
    )
    .await
    .unwrap()
    .into_inner();
    audited += 4;

    // Rejected or no-op: nothing audited
    assert_err!(posts::archive(store, &moderator, post.id).await);
    assert_err!(posts::soft_delete(store, &admin, post.id, None).await);
    assert_err!(users::ban(store, &admin, target.id, " ").await);
    assert!(!users::ban(store, &admin, target.id, "again")
        .await
        .unwrap()
        .is_changed());
    assert!(!categories::move_category(store, &admin, root.id, MoveDirection::Up)
        .await
        .unwrap()
        .is_changed());

    // Audited
    assert_ok!(posts::archive(store, &admin, post.id).await);
    audited += 1;

    audited
}

#[tokio::test]
async fn test_one_entry_per_successful_transition() {
    let app = TestApp::new();
    let audited = mixed_workload(&app).await;

    let chain = app.store.moderation_log_chain().await.unwrap();
    assert_eq!(chain.len(), audited);

    let actions: Vec<ActionType> = chain.iter().map(|e| e.action_type).collect();
    assert_eq!(
        actions,
        vec![
            ActionType::Hide,
            ActionType::SoftDelete,
            ActionType::Ban,
            ActionType::CategoryCreate,
            ActionType::Archive,
        ]
    );
}

#[tokio::test]
async fn test_chain_links_from_genesis_and_verifies() {
    let app = TestApp::new();
    mixed_workload(&app).await;

    let chain = app.store.moderation_log_chain().await.unwrap();
    assert_eq!(chain[0].prev_hash, GENESIS_HASH);
    for pair in chain.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].entry_hash);
    }
    for entry in &chain {
        assert_eq!(entry.entry_hash.len(), 64);
        assert_eq!(rehash(entry), entry.entry_hash);
    }
    assert_eq!(verify_chain(&chain), Ok(()));

    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let report = audit::service::verify(app.store.as_ref(), &admin)
        .await
        .unwrap();
    assert!(report.valid);
    assert_eq!(report.entries, chain.len());
    assert_eq!(report.head_hash.as_deref(), Some(chain[4].entry_hash.as_str()));
    assert!(report.first_break.is_none());
}

#[tokio::test]
async fn test_tampering_is_detected_at_first_altered_entry() {
    let app = TestApp::new();
    mixed_workload(&app).await;
    let chain = app.store.moderation_log_chain().await.unwrap();

    let mut edited = chain.clone();
    edited[2].reason = Some("nothing to see".to_string());
    let broken = verify_chain(&edited).unwrap_err();
    assert_eq!(broken.index, 2);
    assert_eq!(broken.entry_id, chain[2].id);
    assert_eq!(broken.kind, ChainBreakKind::ContentMismatch);

    let mut removed = chain.clone();
    removed.remove(1);
    let broken = verify_chain(&removed).unwrap_err();
    assert_eq!(broken.index, 1);
    assert_eq!(broken.kind, ChainBreakKind::BrokenLink);
}

#[tokio::test]
async fn test_empty_log_verifies() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);

    let report = audit::service::verify(app.store.as_ref(), &admin)
        .await
        .unwrap();
    assert!(report.valid);
    assert_eq!(report.entries, 0);
    assert_eq!(report.head_hash, None);
}

#[tokio::test]
async fn test_list_filters_by_target_and_action() {
    let app = TestApp::new();
    mixed_workload(&app).await;
    let admin = actor_with_tier(RoleTier::ForumAdmin);

    let page = audit::service::list_entries(
        app.store.as_ref(),
        &admin,
        LogFilter {
            target_type: Some(TargetType::Post),
            ..LogFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(page.total, 3);
    assert!(page.entries.iter().all(|e| e.target_type == TargetType::Post));
    // Newest first
    assert_eq!(page.entries[0].action_type, ActionType::Archive);

    let bans = audit::service::list_entries(
        app.store.as_ref(),
        &admin,
        LogFilter {
            action_type: Some(ActionType::Ban),
            ..LogFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(bans.total, 1);
    assert_eq!(bans.entries[0].reason.as_deref(), Some("spam"));

    let post_id = page.entries[0].target_id;
    let by_target = audit::service::list_entries(
        app.store.as_ref(),
        &admin,
        LogFilter {
            target_id: Some(post_id),
            ..LogFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_target.total, 3);
}

#[tokio::test]
async fn test_list_paginates_and_clamps() {
    let app = TestApp::new();
    mixed_workload(&app).await;
    let admin = actor_with_tier(RoleTier::ForumAdmin);

    let page = audit::service::list_entries(
        app.store.as_ref(),
        &admin,
        LogFilter {
            limit: 2,
            offset: 1,
            ..LogFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.total, 5);
    assert_eq!(page.entries[0].action_type, ActionType::CategoryCreate);

    let clamped = audit::service::list_entries(
        app.store.as_ref(),
        &admin,
        LogFilter {
            limit: 10_000,
            offset: -5,
            ..LogFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(clamped.limit, 100);
    assert_eq!(clamped.offset, 0);
    assert_eq!(clamped.entries.len(), 5);
}

#[tokio::test]
async fn test_log_reads_require_forum_admin() {
    let app = TestApp::new();
    let moderator = actor_with_tier(RoleTier::Moderator);

    assert!(matches!(
        audit::service::list_entries(app.store.as_ref(), &moderator, LogFilter::default()).await,
        Err(ModerationError::Authorization(_))
    ));
    assert!(matches!(
        audit::service::verify(app.store.as_ref(), &moderator).await,
        Err(ModerationError::Authorization(_))
    ));
}
