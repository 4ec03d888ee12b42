//! Shared fixtures for the integration tests
//!
//! Every test gets its own in-memory SQLite database, so the suites need no
//! external services and can run in parallel.

#![allow(dead_code)]

use todo_shared::auth::password::{Argon2Authenticator, HashingParams};
use todo_shared::db::manager::UserDataManager;
use todo_shared::db::{DataManager, DatabaseConfig, SqlQuerier};
use todo_shared::models::{
    ItemCreationInput, OAuth2ClientCreationInput, User, UserCreationInput, WebhookCreationInput,
};

/// Argon2 with cheap parameters keeps the suite fast
pub fn authenticator() -> Argon2Authenticator {
    Argon2Authenticator::new(HashingParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
}

pub fn test_config() -> DatabaseConfig {
    DatabaseConfig {
        export_bucket_size: 4,
        export_max_concurrency: 2,
        ..DatabaseConfig::sqlite_in_memory()
    }
}

/// A migrated, empty store
pub async fn migrated_querier() -> SqlQuerier {
    let querier = SqlQuerier::new(test_config()).expect("Failed to build querier");
    querier
        .migrate(&authenticator(), None)
        .await
        .expect("Failed to migrate");
    querier
}

pub fn user_input(username: &str) -> UserCreationInput {
    UserCreationInput {
        username: username.to_string(),
        hashed_password: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
        salt: vec![7; 16],
        two_factor_secret: "JBSWY3DPEHPK3PXP".to_string(),
    }
}

/// Creates a user and verifies their two-factor secret
pub async fn verified_user(manager: &dyn DataManager, username: &str) -> User {
    let user = manager
        .create_user(&user_input(username))
        .await
        .expect("Failed to create user");
    manager
        .verify_user_two_factor_secret(user.id)
        .await
        .expect("Failed to verify user");
    manager.get_user(user.id).await.expect("Failed to get user")
}

pub fn item_input(name: &str, owner: i64) -> ItemCreationInput {
    ItemCreationInput {
        name: name.to_string(),
        details: format!("details for {}", name),
        belongs_to_user: owner,
    }
}

pub fn webhook_input(name: &str, owner: i64) -> WebhookCreationInput {
    WebhookCreationInput {
        name: name.to_string(),
        content_type: "application/json".to_string(),
        url: "https://hooks.example.com/todo".to_string(),
        method: "POST".to_string(),
        events: vec!["item_created".to_string(), "item_archived".to_string()],
        data_types: vec!["item".to_string()],
        topics: Vec::new(),
        belongs_to_user: owner,
    }
}

pub fn oauth2_client_input(client_id: &str, owner: i64) -> OAuth2ClientCreationInput {
    OAuth2ClientCreationInput {
        name: format!("client {}", client_id),
        client_id: client_id.to_string(),
        client_secret: "s3cr3t".to_string(),
        redirect_uri: "https://app.example.com/callback".to_string(),
        scopes: vec!["items:read".to_string(), "items:write".to_string()],
        implicit_allowed: true,
        belongs_to_user: owner,
    }
}
