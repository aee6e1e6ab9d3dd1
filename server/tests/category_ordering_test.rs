//! Category tree ordering integration tests over the in-memory store.
//!
//! Run with: `cargo test --test category_ordering_test`

mod helpers;

use helpers::{actor_with_tier, category, TestApp};
use portal_server::audit::{ActionType, LogFilter};
use portal_server::moderation::categories;
use portal_server::moderation::types::{Category, CreateCategoryRequest, MoveDirection};
use portal_server::moderation::ModerationError;
use portal_server::permissions::{Actor, RoleTier};
use portal_server::store::ModerationStore;
use uuid::Uuid;

fn request(name: &str, slug: &str, parent_id: Option<Uuid>) -> CreateCategoryRequest {
    CreateCategoryRequest {
        name: name.to_string(),
        slug: slug.to_string(),
        parent_id,
        description: None,
    }
}

async fn create(app: &TestApp, admin: &Actor, slug: &str, parent_id: Option<Uuid>) -> Category {
    categories::create_category(app.store.as_ref(), admin, request(slug, slug, parent_id))
        .await
        .unwrap()
        .into_inner()
}

/// Seed three root siblings with orders 1, 2, 3.
async fn seed_roots(app: &TestApp) -> [Category; 3] {
    let rows = [
        category(None, "announcements", 1),
        category(None, "ferries", 2),
        category(None, "markets", 3),
    ];
    for row in &rows {
        app.store.seed_category(row.clone()).await;
    }
    rows
}

async fn order_of(app: &TestApp, id: Uuid) -> i32 {
    app.store
        .find_category(id)
        .await
        .unwrap()
        .unwrap()
        .display_order
}

async fn log_len(app: &TestApp) -> i64 {
    app.store
        .count_moderation_log(&LogFilter::default())
        .await
        .unwrap()
}

// ============================================================================
// Moves
// ============================================================================

#[tokio::test]
async fn test_move_up_swaps_with_previous_sibling_only() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let [first, second, third] = seed_roots(&app).await;

    let outcome = categories::move_category(
        app.store.as_ref(),
        &admin,
        second.id,
        MoveDirection::Up,
    )
    .await
    .unwrap();
    assert!(outcome.is_changed());
    assert_eq!(outcome.into_inner().display_order, 1);

    assert_eq!(order_of(&app, second.id).await, 1);
    assert_eq!(order_of(&app, first.id).await, 2);
    assert_eq!(order_of(&app, third.id).await, 3);

    let siblings = app.store.list_siblings(None).await.unwrap();
    let ids: Vec<Uuid> = siblings.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second.id, first.id, third.id]);

    let entries = app
        .store
        .list_moderation_log(&LogFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, ActionType::CategoryMove);
    assert_eq!(entries[0].target_id, second.id);
}

#[tokio::test]
async fn test_moves_preserve_order_multiset() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let roots = seed_roots(&app).await;

    let moves = [
        (roots[2].id, MoveDirection::Up),
        (roots[0].id, MoveDirection::Down),
        (roots[2].id, MoveDirection::Up),
        (roots[1].id, MoveDirection::Down),
    ];
    for (id, direction) in moves {
        categories::move_category(app.store.as_ref(), &admin, id, direction)
            .await
            .unwrap();

        let mut orders: Vec<i32> = app
            .store
            .list_siblings(None)
            .await
            .unwrap()
            .iter()
            .map(|c| c.display_order)
            .collect();
        orders.sort_unstable();
        assert_eq!(orders, vec![1, 2, 3]);
    }
}

#[tokio::test]
async fn test_boundary_moves_are_noops_without_audit() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let [first, _, third] = seed_roots(&app).await;

    let up = categories::move_category(app.store.as_ref(), &admin, first.id, MoveDirection::Up)
        .await
        .unwrap();
    assert!(!up.is_changed());
    assert_eq!(up.into_inner().display_order, 1);

    let down = categories::move_category(app.store.as_ref(), &admin, third.id, MoveDirection::Down)
        .await
        .unwrap();
    assert!(!down.is_changed());

    assert_eq!(log_len(&app).await, 0);
}

#[tokio::test]
async fn test_moves_stay_within_sibling_set() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let [parent, ..] = seed_roots(&app).await;
    let child_a = category(Some(parent.id), "timetables", 1);
    let child_b = category(Some(parent.id), "fares", 2);
    app.store.seed_category(child_a.clone()).await;
    app.store.seed_category(child_b.clone()).await;

    // The only child above child_a's position is none; it must not swap with a root.
    let outcome =
        categories::move_category(app.store.as_ref(), &admin, child_a.id, MoveDirection::Up)
            .await
            .unwrap();
    assert!(!outcome.is_changed());

    categories::move_category(app.store.as_ref(), &admin, child_b.id, MoveDirection::Up)
        .await
        .unwrap();
    assert_eq!(order_of(&app, child_b.id).await, 1);
    assert_eq!(order_of(&app, child_a.id).await, 2);
    assert_eq!(order_of(&app, parent.id).await, 1);
}

#[tokio::test]
async fn test_move_unknown_category_is_not_found() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);

    let err = categories::move_category(
        app.store.as_ref(),
        &admin,
        Uuid::now_v7(),
        MoveDirection::Down,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModerationError::NotFound(_)));
}

#[tokio::test]
async fn test_moderator_cannot_reorder() {
    let app = TestApp::new();
    let moderator = actor_with_tier(RoleTier::Moderator);
    let [_, second, _] = seed_roots(&app).await;

    let err = categories::move_category(
        app.store.as_ref(),
        &moderator,
        second.id,
        MoveDirection::Up,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModerationError::Authorization(_)));
    assert_eq!(order_of(&app, second.id).await, 2);
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_appends_after_current_max() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);

    let first = create(&app, &admin, "general", None).await;
    assert_eq!(first.display_order, 1);
    assert!(first.is_active);
    assert!(!first.is_archived);

    // Gaps are kept: the next one lands after the highest order, not the count.
    app.store.seed_category(category(None, "legacy", 7)).await;
    let next = create(&app, &admin, "events", None).await;
    assert_eq!(next.display_order, 8);

    // Child sets are numbered independently.
    let child = create(&app, &admin, "meetups", Some(first.id)).await;
    assert_eq!(child.display_order, 1);
    assert_eq!(child.parent_id, Some(first.id));

    let entries = app
        .store
        .list_moderation_log(&LogFilter {
            action_type: Some(ActionType::CategoryCreate),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn test_create_rejects_duplicate_slug() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    create(&app, &admin, "general", None).await;

    let err = categories::create_category(
        app.store.as_ref(),
        &admin,
        request("General again", "general", None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModerationError::Conflict(_)));
    assert_eq!(log_len(&app).await, 1);
}

#[tokio::test]
async fn test_create_enforces_two_level_depth() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let root = create(&app, &admin, "general", None).await;
    let child = create(&app, &admin, "introductions", Some(root.id)).await;

    let err = categories::create_category(
        app.store.as_ref(),
        &admin,
        request("Too deep", "too-deep", Some(child.id)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModerationError::Validation(_)));

    let err = categories::create_category(
        app.store.as_ref(),
        &admin,
        request("Orphan", "orphan", Some(Uuid::now_v7())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModerationError::NotFound(_)));
}

#[tokio::test]
async fn test_create_validates_name_and_slug() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);

    for bad in [
        request("   ", "blank-name", None),
        request("Upper slug", "Upper", None),
        request("Spaced slug", "two words", None),
    ] {
        let err = categories::create_category(app.store.as_ref(), &admin, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
    }
    assert!(app.store.list_categories().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_under_archived_parent_fails() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let root = create(&app, &admin, "general", None).await;
    categories::archive_category(app.store.as_ref(), &admin, root.id)
        .await
        .unwrap();

    let err = categories::create_category(
        app.store.as_ref(),
        &admin,
        request("Child", "child", Some(root.id)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ModerationError::Precondition(_)));
}

// ============================================================================
// Archive / activation
// ============================================================================

#[tokio::test]
async fn test_archive_keeps_order_and_children() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let [_, second, _] = seed_roots(&app).await;
    let child = category(Some(second.id), "timetables", 1);
    app.store.seed_category(child.clone()).await;

    let archived = categories::archive_category(app.store.as_ref(), &admin, second.id)
        .await
        .unwrap();
    assert!(archived.is_changed());
    let archived = archived.into_inner();
    assert!(archived.is_archived);
    assert!(!archived.is_active);
    assert_eq!(archived.display_order, 2);

    let child_after = app.store.find_category(child.id).await.unwrap().unwrap();
    assert!(child_after.is_active);
    assert!(!child_after.is_archived);

    let again = categories::archive_category(app.store.as_ref(), &admin, second.id)
        .await
        .unwrap();
    assert!(!again.is_changed());
    assert_eq!(log_len(&app).await, 1);
}

#[tokio::test]
async fn test_archived_category_cannot_be_reactivated() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let [first, ..] = seed_roots(&app).await;
    categories::archive_category(app.store.as_ref(), &admin, first.id)
        .await
        .unwrap();

    let err = categories::set_category_active(app.store.as_ref(), &admin, first.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ModerationError::Precondition(_)));

    // Deactivating an already inactive archived category is a no-op.
    let outcome = categories::set_category_active(app.store.as_ref(), &admin, first.id, false)
        .await
        .unwrap();
    assert!(!outcome.is_changed());
}

#[tokio::test]
async fn test_activation_toggle_is_audited_once_per_change() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let [first, ..] = seed_roots(&app).await;

    let off = categories::set_category_active(app.store.as_ref(), &admin, first.id, false)
        .await
        .unwrap();
    assert!(off.is_changed());
    let redundant = categories::set_category_active(app.store.as_ref(), &admin, first.id, false)
        .await
        .unwrap();
    assert!(!redundant.is_changed());
    let on = categories::set_category_active(app.store.as_ref(), &admin, first.id, true)
        .await
        .unwrap();
    assert!(on.is_changed());

    let entries = app
        .store
        .list_moderation_log(&LogFilter::default())
        .await
        .unwrap();
    let actions: Vec<ActionType> = entries.iter().map(|e| e.action_type).collect();
    assert_eq!(
        actions,
        vec![ActionType::CategoryActivate, ActionType::CategoryDeactivate]
    );
}

#[tokio::test]
async fn test_listing_hides_inactive_below_forum_admin() {
    let app = TestApp::new();
    let admin = actor_with_tier(RoleTier::ForumAdmin);
    let member = actor_with_tier(RoleTier::None);
    let [first, second, third] = seed_roots(&app).await;
    categories::set_category_active(app.store.as_ref(), &admin, second.id, false)
        .await
        .unwrap();

    let all = categories::list_categories(app.store.as_ref(), &admin)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let visible: Vec<Uuid> = categories::list_categories(app.store.as_ref(), &member)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(visible, vec![first.id, third.id]);
}
