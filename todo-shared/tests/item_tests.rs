/// Integration tests for item storage
///
/// Run against an in-memory SQLite store: cargo test --test item_tests

mod common;

use common::{item_input, migrated_querier, verified_user};
use todo_shared::db::manager::ItemDataManager;
use todo_shared::error::DatabaseError;
use todo_shared::models::{ItemUpdateInput, QueryFilter};

#[tokio::test]
async fn test_create_then_get_returns_same_item() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;

    let created = querier
        .create_item(&item_input("buy milk", owner.id))
        .await
        .expect("Failed to create item");
    assert!(created.id > 0);
    assert_eq!(created.name, "buy milk");
    assert!(created.last_updated_on.is_none());

    let fetched = querier.get_item(created.id, owner.id).await.unwrap();
    assert_eq!(fetched, created);
    assert!(querier.item_exists(created.id, owner.id).await.unwrap());
}

#[tokio::test]
async fn test_unset_timestamps_read_back_as_none() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let created = querier.create_item(&item_input("fresh", owner.id)).await.unwrap();

    let fetched = querier.get_item(created.id, owner.id).await.unwrap();
    assert!(fetched.last_updated_on.is_none());
    assert!(fetched.archived_on.is_none());

    let listed = querier.get_items(owner.id, None).await.unwrap();
    assert_eq!(listed.items, vec![fetched]);

    querier.archive_item(created.id, owner.id).await.unwrap();
    let filter = QueryFilter {
        include_archived: true,
        ..Default::default()
    };
    let archived = querier.get_items(owner.id, Some(&filter)).await.unwrap();
    assert!(archived.items[0].archived_on.is_some());
    assert_eq!(archived.items[0].last_updated_on, archived.items[0].archived_on);
}

#[tokio::test]
async fn test_items_are_owner_scoped() {
    let querier = migrated_querier().await;
    let alice = verified_user(&querier, "alice").await;
    let bob = verified_user(&querier, "bob").await;

    let alices = querier.create_item(&item_input("alice's", alice.id)).await.unwrap();
    let bobs = querier.create_item(&item_input("bob's", bob.id)).await.unwrap();

    let list = querier.get_items(alice.id, None).await.unwrap();
    assert_eq!(list.items, vec![alices.clone()]);
    assert_eq!(list.pagination.total_count, 1);

    let admin_list = querier.get_items_for_admin(None).await.unwrap();
    let ids: Vec<i64> = admin_list.items.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![alices.id, bobs.id]);

    assert!(matches!(
        querier.get_item(bobs.id, alice.id).await,
        Err(DatabaseError::NotFound)
    ));
    assert!(!querier.item_exists(bobs.id, alice.id).await.unwrap());
}

#[tokio::test]
async fn test_archive_twice_is_not_found() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let item = querier.create_item(&item_input("temp", owner.id)).await.unwrap();

    querier.archive_item(item.id, owner.id).await.unwrap();

    assert!(matches!(
        querier.archive_item(item.id, owner.id).await,
        Err(DatabaseError::NotFound)
    ));
    assert!(querier.get_item(item.id, owner.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_archived_items_hidden_unless_requested() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let kept = querier.create_item(&item_input("kept", owner.id)).await.unwrap();
    let archived = querier.create_item(&item_input("gone", owner.id)).await.unwrap();
    querier.archive_item(archived.id, owner.id).await.unwrap();

    let live = querier.get_items(owner.id, None).await.unwrap();
    assert_eq!(live.items.len(), 1);
    assert_eq!(live.items[0].id, kept.id);
    assert!(live.items.iter().all(|item| item.archived_on.is_none()));

    let filter = QueryFilter {
        include_archived: true,
        ..Default::default()
    };
    let everything = querier.get_items(owner.id, Some(&filter)).await.unwrap();
    assert_eq!(everything.pagination.total_count, 2);
    assert!(everything.items.iter().any(|item| item.archived_on.is_some()));

    // Counts cover archived rows
    assert_eq!(querier.get_all_items_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_pagination() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    for n in 0..5 {
        querier
            .create_item(&item_input(&format!("item {}", n), owner.id))
            .await
            .unwrap();
    }

    let filter = QueryFilter {
        page: 2,
        limit: 2,
        ..Default::default()
    };
    let page = querier.get_items(owner.id, Some(&filter)).await.unwrap();
    assert_eq!(page.pagination.page, 2);
    assert_eq!(page.pagination.limit, 2);
    assert_eq!(page.pagination.total_count, 5);
    let names: Vec<&str> = page.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["item 2", "item 3"]);
}

#[tokio::test]
async fn test_update_item() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let mut item = querier.create_item(&item_input("draft", owner.id)).await.unwrap();

    let changes = item.update(&ItemUpdateInput {
        name: Some("final".to_string()),
        details: None,
    });
    assert_eq!(changes.len(), 1);

    querier.update_item(&mut item, &changes).await.unwrap();
    assert!(item.last_updated_on.is_some());

    let fetched = querier.get_item(item.id, owner.id).await.unwrap();
    assert_eq!(fetched.name, "final");
    assert_eq!(fetched.last_updated_on, item.last_updated_on);
}

#[tokio::test]
async fn test_get_items_with_ids() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let other = verified_user(&querier, "other").await;
    let first = querier.create_item(&item_input("first", owner.id)).await.unwrap();
    let second = querier.create_item(&item_input("second", owner.id)).await.unwrap();
    let foreign = querier.create_item(&item_input("foreign", other.id)).await.unwrap();

    let items = querier
        .get_items_with_ids(owner.id, &[second.id, foreign.id, first.id])
        .await
        .unwrap();
    assert_eq!(items, vec![first, second]);

    assert!(querier.get_items_with_ids(owner.id, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_item_is_rejected() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;

    let result = querier.create_item(&item_input("", owner.id)).await;
    assert!(matches!(result, Err(DatabaseError::Validation(_))));
    assert_eq!(querier.get_all_items_count().await.unwrap(), 0);
}
