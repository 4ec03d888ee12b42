/// Integration tests for bucketed full-table export

mod common;

use common::{item_input, migrated_querier, user_input, verified_user};
use std::collections::HashSet;
use todo_shared::db::manager::{
    AuditLogEntryDataManager, ItemDataManager, OAuth2ClientDataManager, UserDataManager,
    WebhookDataManager,
};
use todo_shared::models::Item;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn drain<T>(mut rx: mpsc::Receiver<Vec<T>>) -> Vec<T> {
    let mut rows = Vec::new();
    while let Some(batch) = rx.recv().await {
        rows.extend(batch);
    }
    rows
}

#[tokio::test]
async fn test_export_returns_every_row_once() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    for n in 0..10 {
        querier
            .create_item(&item_input(&format!("item {}", n), owner.id))
            .await
            .unwrap();
    }
    // Archived rows are part of the export
    querier.archive_item(3, owner.id).await.unwrap();

    let (tx, rx) = mpsc::channel(2);
    let handle = querier
        .get_all_items(tx, CancellationToken::new())
        .await
        .unwrap();

    let rows: Vec<Item> = drain(rx).await;
    let summary = handle.await.unwrap();

    assert_eq!(rows.len(), 10);
    let ids: HashSet<i64> = rows.iter().map(|item| item.id).collect();
    assert_eq!(ids, (1..=10).collect());
    assert_eq!(summary.buckets, 3);
    assert_eq!(summary.rows_sent, 10);
    assert_eq!(summary.failed_buckets, 0);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_export_survives_id_gaps() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    for n in 0..12 {
        querier
            .create_item(&item_input(&format!("item {}", n), owner.id))
            .await
            .unwrap();
    }
    sqlx::query("DELETE FROM items WHERE id IN (2, 5, 6, 7, 8)")
        .execute(querier.pool())
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let handle = querier
        .get_all_items(tx, CancellationToken::new())
        .await
        .unwrap();
    let rows = drain(rx).await;
    let summary = handle.await.unwrap();

    let mut ids: Vec<i64> = rows.iter().map(|item| item.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3, 4, 9, 10, 11, 12]);
    assert_eq!(summary.rows_sent, 7);
}

#[tokio::test]
async fn test_export_of_empty_table() {
    let querier = migrated_querier().await;

    let (tx, rx) = mpsc::channel(1);
    let handle = querier
        .get_all_items(tx, CancellationToken::new())
        .await
        .unwrap();

    assert!(drain(rx).await.is_empty());
    let summary = handle.await.unwrap();
    assert_eq!(summary.buckets, 0);
    assert_eq!(summary.rows_sent, 0);
}

#[tokio::test]
async fn test_every_empty_table_exports_nothing() {
    let querier = migrated_querier().await;

    let (tx, rx) = mpsc::channel(1);
    let handle = querier
        .get_all_webhooks(tx, CancellationToken::new())
        .await
        .unwrap();
    assert!(drain(rx).await.is_empty());
    assert_eq!(handle.await.unwrap().buckets, 0);

    let (tx, rx) = mpsc::channel(1);
    let handle = querier
        .get_all_oauth2_clients(tx, CancellationToken::new())
        .await
        .unwrap();
    assert!(drain(rx).await.is_empty());
    assert_eq!(handle.await.unwrap().buckets, 0);

    let (tx, rx) = mpsc::channel(1);
    let handle = querier
        .get_all_users(tx, CancellationToken::new())
        .await
        .unwrap();
    assert!(drain(rx).await.is_empty());
    assert_eq!(handle.await.unwrap().rows_sent, 0);
}

#[tokio::test]
async fn test_exported_rows_keep_unset_timestamps() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    for n in 0..3 {
        querier
            .create_item(&item_input(&format!("item {}", n), owner.id))
            .await
            .unwrap();
    }
    querier.archive_item(2, owner.id).await.unwrap();

    let (tx, rx) = mpsc::channel(4);
    let handle = querier
        .get_all_items(tx, CancellationToken::new())
        .await
        .unwrap();
    let mut rows: Vec<Item> = drain(rx).await;
    handle.await.unwrap();
    rows.sort_by_key(|item| item.id);

    let archived: Vec<Option<i64>> = rows.iter().map(|item| item.archived_on).collect();
    assert!(archived[0].is_none());
    assert!(archived[1].is_some());
    assert!(archived[2].is_none());
}

#[tokio::test]
async fn test_cancelled_export_sends_nothing() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    querier.create_item(&item_input("one", owner.id)).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (tx, rx) = mpsc::channel(1);
    let handle = querier.get_all_items(tx, cancel).await.unwrap();

    assert!(drain(rx).await.is_empty());
    assert!(handle.await.unwrap().cancelled);
}

#[tokio::test]
async fn test_user_and_audit_exports() {
    let querier = migrated_querier().await;
    for n in 0..6 {
        querier
            .create_user(&user_input(&format!("user{}", n)))
            .await
            .unwrap();
    }

    let (tx, rx) = mpsc::channel(4);
    let handle = querier
        .get_all_users(tx, CancellationToken::new())
        .await
        .unwrap();
    let users = drain(rx).await;
    handle.await.unwrap();
    assert_eq!(users.len(), 6);

    let (tx, rx) = mpsc::channel(4);
    let handle = querier
        .get_all_audit_log_entries(tx, CancellationToken::new())
        .await
        .unwrap();
    let entries = drain(rx).await;
    handle.await.unwrap();
    assert_eq!(
        entries.len() as u64,
        querier.get_all_audit_log_entries_count().await.unwrap()
    );
    assert!(entries.iter().all(|entry| entry.event_type == "user_created"));
}
