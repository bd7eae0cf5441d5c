//! Database tests

use super::*;
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

async fn create_account(db: &Database, username: &str, is_private: bool) -> Account {
    let account = Account {
        id: EntityId::new().0,
        username: username.to_string(),
        display_name: Some(username.to_uppercase()),
        is_private,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    assert!(db.insert_account(&account).await.unwrap());
    account
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_account_insert_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;
    let account = create_account(&db, "alice", false).await;

    assert!(!db.insert_account(&account).await.unwrap());

    let retrieved = db.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(retrieved.username, "alice");
    assert!(!retrieved.is_private);

    assert!(db.set_account_private(&account.id, true).await.unwrap());
    assert!(db.get_account(&account.id).await.unwrap().unwrap().is_private);
}

#[tokio::test]
async fn test_get_accounts_by_ids_skips_missing() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;
    let bob = create_account(&db, "bob", false).await;

    let accounts = db
        .get_accounts_by_ids(&[alice.id.clone(), "missing".to_string(), bob.id.clone()])
        .await
        .unwrap();
    assert_eq!(accounts.len(), 2);
    assert!(db.get_accounts_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_follow_public_account_creates_mirrored_approved_edge() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;
    let bob = create_account(&db, "bob", false).await;

    let outcome = db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    assert_eq!(outcome, FollowOutcome::Created(EdgeState::Approved));

    let alice_sets = db.relationship_sets(&alice.id).await.unwrap();
    let bob_sets = db.relationship_sets(&bob.id).await.unwrap();
    assert!(alice_sets.following.contains(&bob.id));
    assert!(bob_sets.followers.contains(&alice.id));
    assert!(alice_sets.sent_requests.is_empty());
    assert!(bob_sets.follow_requests.is_empty());

    assert_eq!(db.count_edges(&bob.id).await.unwrap(), (1, 0));
    assert_eq!(db.count_edges(&alice.id).await.unwrap(), (0, 1));
}

#[tokio::test]
async fn test_follow_private_account_creates_pending_edge() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;
    let bob = create_account(&db, "bob", true).await;

    let outcome = db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    assert_eq!(outcome, FollowOutcome::Created(EdgeState::Pending));

    let again = db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    assert_eq!(again, FollowOutcome::Existing(EdgeState::Pending));

    let alice_sets = db.relationship_sets(&alice.id).await.unwrap();
    let bob_sets = db.relationship_sets(&bob.id).await.unwrap();
    assert!(alice_sets.sent_requests.contains(&bob.id));
    assert!(bob_sets.follow_requests.contains(&alice.id));
    assert!(alice_sets.following.is_empty());
    assert!(bob_sets.followers.is_empty());
}

#[tokio::test]
async fn test_follow_missing_target() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;

    let outcome = db.create_follow_edge(&alice.id, "nobody").await.unwrap();
    assert_eq!(outcome, FollowOutcome::TargetMissing);
    assert!(db.relationship_sets(&alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_approve_and_decline_requests() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;
    let carol = create_account(&db, "carol", false).await;
    let bob = create_account(&db, "bob", true).await;

    db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    db.create_follow_edge(&carol.id, &bob.id).await.unwrap();

    assert!(db.approve_follow_request(&bob.id, &alice.id).await.unwrap());
    assert!(!db.approve_follow_request(&bob.id, &alice.id).await.unwrap());
    assert_eq!(
        db.get_edge_state(&alice.id, &bob.id).await.unwrap(),
        Some(EdgeState::Approved)
    );

    assert!(db.delete_follow_request(&bob.id, &carol.id).await.unwrap());
    assert!(!db.delete_follow_request(&bob.id, &carol.id).await.unwrap());
    assert_eq!(db.get_edge_state(&carol.id, &bob.id).await.unwrap(), None);

    let pending = db.list_followers(&bob.id, EdgeState::Pending).await.unwrap();
    assert!(pending.is_empty());
    let approved = db.list_followers(&bob.id, EdgeState::Approved).await.unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, alice.id);
}

#[tokio::test]
async fn test_remove_follow_edges_keeps_reverse_approved_edge() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;
    let bob = create_account(&db, "bob", false).await;

    db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    db.create_follow_edge(&bob.id, &alice.id).await.unwrap();

    assert_eq!(db.remove_follow_edges(&alice.id, &bob.id).await.unwrap(), 1);
    assert_eq!(db.remove_follow_edges(&alice.id, &bob.id).await.unwrap(), 0);

    assert_eq!(db.get_edge_state(&alice.id, &bob.id).await.unwrap(), None);
    assert_eq!(
        db.get_edge_state(&bob.id, &alice.id).await.unwrap(),
        Some(EdgeState::Approved)
    );
}

#[tokio::test]
async fn test_remove_follow_edges_cancels_requests_both_ways() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", true).await;
    let bob = create_account(&db, "bob", true).await;

    db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    db.create_follow_edge(&bob.id, &alice.id).await.unwrap();

    assert_eq!(db.remove_follow_edges(&alice.id, &bob.id).await.unwrap(), 2);
    assert!(db.relationship_sets(&alice.id).await.unwrap().is_empty());
    assert!(db.relationship_sets(&bob.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_follower() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_account(&db, "alice", false).await;
    let bob = create_account(&db, "bob", false).await;

    db.create_follow_edge(&alice.id, &bob.id).await.unwrap();
    assert!(db.remove_follower(&bob.id, &alice.id).await.unwrap());
    assert!(!db.remove_follower(&bob.id, &alice.id).await.unwrap());
    assert!(db.relationship_sets(&alice.id).await.unwrap().following.is_empty());
}

#[tokio::test]
async fn test_message_append_orders_thread() {
    let (db, _temp_dir) = create_test_db().await;

    let first = db.insert_message("a", "b", "hello").await.unwrap();
    let second = db.insert_message("b", "a", "hi").await.unwrap();
    let third = db.insert_message("a", "b", "how are you").await.unwrap();
    db.insert_message("a", "c", "unrelated").await.unwrap();

    assert!(first.created_at < second.created_at);
    assert!(second.created_at < third.created_at);
    assert!(!first.seen);

    let thread = db.get_thread("b", "a").await.unwrap();
    let ids: Vec<_> = thread.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str(), third.id.as_str()]);
    assert_eq!(thread[0].created_at, first.created_at);

    assert_eq!(db.count_thread("a", "b").await.unwrap(), 3);
    assert_eq!(db.count_unread("b", "a").await.unwrap(), 2);
    assert_eq!(db.count_unread("a", "b").await.unwrap(), 1);
}

#[tokio::test]
async fn test_messages_involving_newest_first() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_message("a", "b", "one").await.unwrap();
    db.insert_message("c", "a", "two").await.unwrap();
    let last = db.insert_message("a", "b", "three").await.unwrap();
    db.insert_message("b", "c", "not mine").await.unwrap();

    let messages = db.get_messages_involving("a").await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].id, last.id);
}

#[tokio::test]
async fn test_mark_seen_only_touches_incoming() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_message("a", "b", "to b").await.unwrap();
    db.insert_message("b", "a", "to a").await.unwrap();
    db.insert_message("c", "b", "from c").await.unwrap();

    assert_eq!(db.mark_thread_seen("b", "a").await.unwrap(), 1);
    assert_eq!(db.count_unread("b", "a").await.unwrap(), 0);
    assert_eq!(db.count_unread("a", "b").await.unwrap(), 1);
    assert_eq!(db.count_unread("b", "c").await.unwrap(), 1);

    assert_eq!(db.mark_all_seen("b").await.unwrap(), 1);
    assert_eq!(db.count_unread("b", "c").await.unwrap(), 0);
    assert_eq!(db.mark_all_seen("b").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_thread_only_removes_pair() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_message("a", "b", "one").await.unwrap();
    db.insert_message("b", "a", "two").await.unwrap();
    db.insert_message("a", "c", "three").await.unwrap();

    assert_eq!(db.delete_thread("b", "a").await.unwrap(), 2);
    assert!(db.get_thread("a", "b").await.unwrap().is_empty());
    assert_eq!(db.get_thread("a", "c").await.unwrap().len(), 1);
}
