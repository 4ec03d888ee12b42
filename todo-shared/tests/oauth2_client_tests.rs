/// Integration tests for OAuth2 client storage

mod common;

use common::{migrated_querier, oauth2_client_input, verified_user};
use todo_shared::db::manager::OAuth2ClientDataManager;
use todo_shared::error::DatabaseError;
use todo_shared::models::OAuth2ClientCreationInput;

#[tokio::test]
async fn test_create_then_get() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;

    let created = querier
        .create_oauth2_client(&oauth2_client_input("abc123", owner.id))
        .await
        .expect("Failed to create client");

    let by_id = querier.get_oauth2_client(created.id, owner.id).await.unwrap();
    assert_eq!(by_id, created);
    assert!(by_id.implicit_allowed);
    assert!(by_id.has_scope("items:write"));

    let by_client_id = querier.get_oauth2_client_by_client_id("abc123").await.unwrap();
    assert_eq!(by_client_id.id, created.id);
}

#[tokio::test]
async fn test_duplicate_client_id_conflicts() {
    let querier = migrated_querier().await;
    let alice = verified_user(&querier, "alice").await;
    let bob = verified_user(&querier, "bob").await;

    let first = querier
        .create_oauth2_client(&oauth2_client_input("shared", alice.id))
        .await
        .unwrap();

    let second = querier
        .create_oauth2_client(&oauth2_client_input("shared", bob.id))
        .await;
    assert!(matches!(
        second,
        Err(DatabaseError::AlreadyExists {
            entity: "oauth2 client"
        })
    ));

    let still_there = querier.get_oauth2_client(first.id, alice.id).await.unwrap();
    assert_eq!(still_there, first);
    assert_eq!(querier.get_all_oauth2_clients_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_generated_credentials_and_archive() {
    let querier = migrated_querier().await;
    let owner = verified_user(&querier, "owner").await;

    let input = OAuth2ClientCreationInput::with_generated_credentials(
        "cli",
        "http://localhost/callback",
        Vec::new(),
        owner.id,
    );
    let client = querier.create_oauth2_client(&input).await.unwrap();
    assert!(client.scopes.is_empty());

    querier.archive_oauth2_client(client.id, owner.id).await.unwrap();
    assert!(matches!(
        querier.get_oauth2_client_by_client_id(&input.client_id).await,
        Err(DatabaseError::NotFound)
    ));

    let entries = querier
        .get_audit_log_entries_for_oauth2_client(client.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
}
