/// Integration tests for readiness, migrations and seeding

mod common;

use common::{authenticator, test_config};
use todo_shared::auth::password::verify_password;
use todo_shared::db::manager::UserDataManager;
use todo_shared::db::pool::{create_pool, health_check, DatabaseConfig};
use todo_shared::db::{DataManager, MigrationState, Provider, SqlQuerier, UserCreationConfig};
use todo_shared::error::DatabaseError;
use todo_shared::models::{AccountStatus, AdminPermissions};

fn seed() -> UserCreationConfig {
    UserCreationConfig {
        username: "admin".to_string(),
        password: "correct horse battery staple".to_string(),
        is_admin: true,
    }
}

#[tokio::test]
async fn test_in_memory_pool_is_healthy() {
    let pool = create_pool(&test_config()).expect("Failed to create pool");
    assert!(health_check(&pool).await.is_ok());
}

#[tokio::test]
async fn test_is_ready() {
    let querier = SqlQuerier::new(test_config()).unwrap();
    assert!(querier.is_ready(1).await.is_ok());
}

#[tokio::test]
async fn test_unreachable_store_is_unready() {
    let config = DatabaseConfig {
        provider: Provider::Sqlite,
        url: "sqlite:///nonexistent-dir/todo.db".to_string(),
        readiness_max_attempts: 2,
        readiness_interval_ms: 1,
        connect_timeout_seconds: 1,
        ..DatabaseConfig::sqlite_in_memory()
    };
    let querier = SqlQuerier::new(config).unwrap();

    assert!(matches!(
        querier.is_ready(2).await,
        Err(DatabaseError::Unready { attempts: 2 })
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = DatabaseConfig {
        provider: Provider::MariaDb,
        url: "postgresql://localhost/todo".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        SqlQuerier::new(config),
        Err(DatabaseError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_migrate_seeds_admin() {
    let querier = SqlQuerier::new(test_config()).unwrap();
    assert_eq!(querier.migration_state().await, MigrationState::NotMigrated);

    querier.migrate(&authenticator(), Some(&seed())).await.unwrap();
    assert_eq!(querier.migration_state().await, MigrationState::Migrated);

    let admin = querier.get_user_by_username("admin").await.unwrap();
    assert!(admin.is_admin);
    assert_eq!(admin.account_status, AccountStatus::Good);
    assert_eq!(admin.admin_permissions, AdminPermissions::all());
    assert_eq!(admin.two_factor_secret_verified_on, Some(admin.created_on));
    assert!(verify_password("correct horse battery staple", &admin.hashed_password).unwrap());
}

#[tokio::test]
async fn test_migrate_twice_is_harmless() {
    let querier = SqlQuerier::new(test_config()).unwrap();

    querier.migrate(&authenticator(), Some(&seed())).await.unwrap();
    querier.migrate(&authenticator(), Some(&seed())).await.unwrap();

    assert_eq!(querier.get_all_users_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_seed_is_rejected() {
    let querier = SqlQuerier::new(test_config()).unwrap();
    let seed = UserCreationConfig {
        username: String::new(),
        password: "pw".to_string(),
        is_admin: false,
    };

    assert!(matches!(
        querier.migrate(&authenticator(), Some(&seed)).await,
        Err(DatabaseError::Configuration(_))
    ));
}
