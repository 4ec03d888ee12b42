/// Integration tests for the audit trail

mod common;

use common::{item_input, migrated_querier, verified_user};
use serde_json::json;
use todo_shared::db::manager::{AuditLogEntryDataManager, ItemDataManager};
use todo_shared::models::{AuditLogContext, AuditLogEntryCreationInput, ItemUpdateInput, QueryFilter};

#[tokio::test]
async fn test_every_mutation_writes_one_entry() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let before = querier.get_all_audit_log_entries_count().await.unwrap();

    let mut item = querier.create_item(&item_input("chore", owner.id)).await.unwrap();
    assert_eq!(querier.get_all_audit_log_entries_count().await.unwrap(), before + 1);

    let changes = item.update(&ItemUpdateInput {
        details: Some("today".to_string()),
        ..Default::default()
    });
    querier.update_item(&mut item, &changes).await.unwrap();
    assert_eq!(querier.get_all_audit_log_entries_count().await.unwrap(), before + 2);

    querier.archive_item(item.id, owner.id).await.unwrap();
    assert_eq!(querier.get_all_audit_log_entries_count().await.unwrap(), before + 3);

    let entries = querier.get_audit_log_entries_for_item(item.id).await.unwrap();
    let events: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(events, vec!["item_created", "item_updated", "item_archived"]);
    for entry in &entries {
        assert_eq!(entry.context_id("item_id"), Some(item.id));
        assert_eq!(entry.context_id("performed_by"), Some(owner.id));
    }
    assert_eq!(entries[1].context["changes"][0]["field_name"], json!("details"));
}

#[tokio::test]
async fn test_failed_mutation_writes_nothing() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;
    let before = querier.get_all_audit_log_entries_count().await.unwrap();

    assert!(querier.archive_item(404, owner.id).await.is_err());
    assert_eq!(querier.get_all_audit_log_entries_count().await.unwrap(), before);
}

#[tokio::test]
async fn test_session_events() {
    let querier = migrated_querier().await;
    let user = verified_user(&querier, "owner").await;

    querier.log_successful_login_event(user.id).await;
    querier.log_unsuccessful_login_bad_password_event(user.id).await;
    querier.log_logout_event(user.id).await;

    let filter = QueryFilter {
        limit: 3,
        sort_by: todo_shared::db::query_builder::SortOrder::Desc,
        ..Default::default()
    };
    let page = querier.get_audit_log_entries(Some(&filter)).await.unwrap();
    let events: Vec<&str> = page.entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        events,
        vec!["user_logged_out", "unsuccessful_login_bad_password", "user_logged_in"]
    );
    assert!(page.pagination.total_count >= 5);
}

#[tokio::test]
async fn test_create_and_get_entry() {
    let querier = migrated_querier().await;

    let mut context = AuditLogContext::new();
    context.insert("user_id".to_string(), json!(42));
    context.insert("note".to_string(), json!({ "nested": [1, 2, 3] }));

    let created = querier
        .create_audit_log_entry(AuditLogEntryCreationInput {
            event_type: "cycle_cookie_secret".to_string(),
            context: context.clone(),
        })
        .await
        .unwrap();

    let fetched = querier.get_audit_log_entry(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.context, context);
}
