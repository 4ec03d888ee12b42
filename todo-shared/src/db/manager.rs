/// The data-access contract
///
/// One trait per entity, combined into [`DataManager`]. Callers hold an
/// `Arc<dyn DataManager>` and never see SQL or the active dialect.
///
/// Reads that take a `user_id` are ownership-scoped: a row owned by someone
/// else is `NotFound`, exactly like a missing one. Archived rows are
/// invisible to every lookup; lists include them only when the filter asks.
///
/// Full-table exports (`get_all_*`) return as soon as their workers are
/// scheduled. Rows arrive on `results` in bucket-sized batches, in no
/// particular order, and the channel closes once the export is done.
///
/// # Example
///
/// ```no_run
/// use todo_shared::auth::password::Argon2Authenticator;
/// use todo_shared::db::manager::provide_data_manager;
/// use todo_shared::db::migrations::UserCreationConfig;
/// use todo_shared::db::pool::DatabaseConfig;
/// use todo_shared::models::ItemCreationInput;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = provide_data_manager(&DatabaseConfig::sqlite_in_memory())?;
/// let admin = UserCreationConfig {
///     username: "admin".to_string(),
///     password: "correct horse battery staple".to_string(),
///     is_admin: true,
/// };
/// manager.migrate(&Argon2Authenticator::default(), Some(&admin)).await?;
///
/// let item = manager
///     .create_item(&ItemCreationInput {
///         name: "water the plants".to_string(),
///         details: String::new(),
///         belongs_to_user: 1,
///     })
///     .await?;
/// assert!(manager.item_exists(item.id, 1).await?);
/// # Ok(())
/// # }
/// ```

use crate::auth::Authenticator;
use crate::db::exporter::ExportSummary;
use crate::db::migrations::UserCreationConfig;
use crate::db::pool::DatabaseConfig;
use crate::db::querier::SqlQuerier;
use crate::error::DatabaseResult;
use crate::models::{
    AuditLogEntry, AuditLogEntryCreationInput, AuditLogEntryList, FieldChangeSummary, Item,
    ItemCreationInput, ItemList, OAuth2Client, OAuth2ClientCreationInput, OAuth2ClientList,
    QueryFilter, User, UserCreationInput, UserList, Webhook, WebhookCreationInput, WebhookList,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running export
pub type ExportHandle = JoinHandle<ExportSummary>;

#[async_trait]
pub trait ItemDataManager: Send + Sync {
    async fn item_exists(&self, item_id: i64, user_id: i64) -> DatabaseResult<bool>;

    async fn get_item(&self, item_id: i64, user_id: i64) -> DatabaseResult<Item>;

    /// Every row, archived included
    async fn get_all_items_count(&self) -> DatabaseResult<u64>;

    async fn get_items(&self, user_id: i64, filter: Option<&QueryFilter>) -> DatabaseResult<ItemList>;

    /// Every user's items
    async fn get_items_for_admin(&self, filter: Option<&QueryFilter>) -> DatabaseResult<ItemList>;

    /// The caller's live items among `ids`. Unknown IDs are skipped.
    async fn get_items_with_ids(&self, user_id: i64, ids: &[i64]) -> DatabaseResult<Vec<Item>>;

    async fn get_all_items(
        &self,
        results: mpsc::Sender<Vec<Item>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle>;

    async fn create_item(&self, input: &ItemCreationInput) -> DatabaseResult<Item>;

    /// Persists `item` and stamps its `last_updated_on`
    async fn update_item(&self, item: &mut Item, changes: &[FieldChangeSummary]) -> DatabaseResult<()>;

    async fn archive_item(&self, item_id: i64, user_id: i64) -> DatabaseResult<()>;

    async fn get_audit_log_entries_for_item(&self, item_id: i64) -> DatabaseResult<Vec<AuditLogEntry>>;
}

#[async_trait]
pub trait WebhookDataManager: Send + Sync {
    async fn get_webhook(&self, webhook_id: i64, user_id: i64) -> DatabaseResult<Webhook>;

    async fn get_all_webhooks_count(&self) -> DatabaseResult<u64>;

    async fn get_webhooks(
        &self,
        user_id: i64,
        filter: Option<&QueryFilter>,
    ) -> DatabaseResult<WebhookList>;

    async fn get_all_webhooks(
        &self,
        results: mpsc::Sender<Vec<Webhook>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle>;

    async fn create_webhook(&self, input: &WebhookCreationInput) -> DatabaseResult<Webhook>;

    async fn update_webhook(
        &self,
        webhook: &mut Webhook,
        changes: &[FieldChangeSummary],
    ) -> DatabaseResult<()>;

    async fn archive_webhook(&self, webhook_id: i64, user_id: i64) -> DatabaseResult<()>;

    async fn get_audit_log_entries_for_webhook(
        &self,
        webhook_id: i64,
    ) -> DatabaseResult<Vec<AuditLogEntry>>;
}

#[async_trait]
pub trait OAuth2ClientDataManager: Send + Sync {
    /// Looks a client up by its row ID, scoped to the owner
    async fn get_oauth2_client(&self, client_id: i64, user_id: i64) -> DatabaseResult<OAuth2Client>;

    /// Looks a client up by its public client identifier
    async fn get_oauth2_client_by_client_id(&self, client_id: &str) -> DatabaseResult<OAuth2Client>;

    async fn get_all_oauth2_clients_count(&self) -> DatabaseResult<u64>;

    async fn get_oauth2_clients(
        &self,
        user_id: i64,
        filter: Option<&QueryFilter>,
    ) -> DatabaseResult<OAuth2ClientList>;

    async fn get_all_oauth2_clients(
        &self,
        results: mpsc::Sender<Vec<OAuth2Client>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle>;

    /// Fails with `AlreadyExists` if the client identifier is taken
    async fn create_oauth2_client(
        &self,
        input: &OAuth2ClientCreationInput,
    ) -> DatabaseResult<OAuth2Client>;

    async fn update_oauth2_client(
        &self,
        client: &mut OAuth2Client,
        changes: &[FieldChangeSummary],
    ) -> DatabaseResult<()>;

    async fn archive_oauth2_client(&self, client_id: i64, user_id: i64) -> DatabaseResult<()>;

    async fn get_audit_log_entries_for_oauth2_client(
        &self,
        client_id: i64,
    ) -> DatabaseResult<Vec<AuditLogEntry>>;
}

#[async_trait]
pub trait UserDataManager: Send + Sync {
    /// A verified, live user
    async fn get_user(&self, user_id: i64) -> DatabaseResult<User>;

    /// A live user that has not verified their two-factor secret yet
    async fn get_user_with_unverified_two_factor_secret(&self, user_id: i64) -> DatabaseResult<User>;

    async fn get_user_by_username(&self, username: &str) -> DatabaseResult<User>;

    /// Verified users whose username starts with `prefix`, case-insensitively
    async fn search_for_users_by_username(&self, prefix: &str) -> DatabaseResult<Vec<User>>;

    async fn get_all_users_count(&self) -> DatabaseResult<u64>;

    async fn get_users(&self, filter: Option<&QueryFilter>) -> DatabaseResult<UserList>;

    async fn get_all_users(
        &self,
        results: mpsc::Sender<Vec<User>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle>;

    /// Inserts an unverified user. Fails with `AlreadyExists` on a taken
    /// username.
    async fn create_user(&self, input: &UserCreationInput) -> DatabaseResult<User>;

    async fn update_user(&self, user: &mut User, changes: &[FieldChangeSummary]) -> DatabaseResult<()>;

    async fn update_user_password(&self, user_id: i64, new_hash: &str) -> DatabaseResult<()>;

    /// Marks the two-factor secret verified and the account in good standing
    async fn verify_user_two_factor_secret(&self, user_id: i64) -> DatabaseResult<()>;

    async fn ban_user(&self, user_id: i64, banned_by: i64, reason: &str) -> DatabaseResult<()>;

    async fn archive_user(&self, user_id: i64) -> DatabaseResult<()>;

    /// Entries about the user or performed by them
    async fn get_audit_log_entries_for_user(&self, user_id: i64) -> DatabaseResult<Vec<AuditLogEntry>>;
}

#[async_trait]
pub trait AuditLogEntryDataManager: Send + Sync {
    async fn get_audit_log_entry(&self, entry_id: i64) -> DatabaseResult<AuditLogEntry>;

    async fn get_all_audit_log_entries_count(&self) -> DatabaseResult<u64>;

    async fn get_audit_log_entries(
        &self,
        filter: Option<&QueryFilter>,
    ) -> DatabaseResult<AuditLogEntryList>;

    async fn get_all_audit_log_entries(
        &self,
        results: mpsc::Sender<Vec<AuditLogEntry>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle>;

    async fn create_audit_log_entry(
        &self,
        input: AuditLogEntryCreationInput,
    ) -> DatabaseResult<AuditLogEntry>;

    async fn log_cycle_cookie_secret_event(&self, user_id: i64);

    async fn log_successful_login_event(&self, user_id: i64);

    async fn log_banned_user_login_attempt_event(&self, user_id: i64);

    async fn log_unsuccessful_login_bad_password_event(&self, user_id: i64);

    async fn log_unsuccessful_login_bad_2fa_token_event(&self, user_id: i64);

    async fn log_logout_event(&self, user_id: i64);

    async fn log_user_updated_two_factor_secret_event(&self, user_id: i64);
}

/// Every entity contract plus the store lifecycle
#[async_trait]
pub trait DataManager:
    ItemDataManager
    + WebhookDataManager
    + OAuth2ClientDataManager
    + UserDataManager
    + AuditLogEntryDataManager
{
    /// Pings up to `max_attempts` times, sleeping the configured interval
    /// between attempts
    ///
    /// Fails with `Unready` if no ping succeeded.
    async fn is_ready(&self, max_attempts: u32) -> DatabaseResult<()>;

    /// Waits for readiness, applies pending migrations once per process and
    /// inserts the seed user if one is configured
    async fn migrate(
        &self,
        authenticator: &dyn Authenticator,
        seed_user: Option<&UserCreationConfig>,
    ) -> DatabaseResult<()>;
}

/// Builds the data manager for the configured provider
///
/// The pool connects lazily, so this succeeds before the store is up. Call
/// [`DataManager::is_ready`] or [`DataManager::migrate`] before use.
///
/// # Errors
///
/// Returns `DatabaseError::Configuration` if the configuration is invalid
pub fn provide_data_manager(config: &DatabaseConfig) -> DatabaseResult<Arc<dyn DataManager>> {
    let querier = SqlQuerier::new(config.clone())?;
    Ok(Arc::new(querier))
}
