use super::{insert_row, qualified, SqlQuerier};
use crate::audit::{
    build_user_archived_event_entry, build_user_banned_event_entry,
    build_user_created_event_entry, build_user_updated_event_entry,
    build_user_updated_password_event_entry, build_user_verified_two_factor_secret_event_entry,
    PERFORMED_BY_KEY, USER_ASSIGNMENT_KEY,
};
use crate::db::dialect::Dialect;
use crate::db::manager::{ExportHandle, UserDataManager};
use crate::db::query_builder::{InsertBuilder, Predicate, SelectBuilder, SortOrder, UpdateBuilder, Value};
use crate::db::scanner::{get_bytes, get_flag, get_i64, get_opt_i64, get_text, FromAnyRow};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::query_filter::TableKind;
use crate::models::{
    AccountStatus, AdminPermissions, AuditLogEntry, FieldChangeSummary, QueryFilter, User,
    UserCreationInput, UserList,
};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use validator::Validate;

pub(crate) const USERS_TABLE: &str = "users";

const USERS_COLUMNS: [&str; 15] = [
    "id",
    "username",
    "hashed_password",
    "salt",
    "requires_password_change",
    "password_last_changed_on",
    "two_factor_secret",
    "two_factor_secret_verified_on",
    "is_admin",
    "admin_permissions",
    "account_status",
    "account_status_explanation",
    "created_on",
    "last_updated_on",
    "archived_on",
];

fn columns() -> Vec<String> {
    qualified(USERS_TABLE, &USERS_COLUMNS)
}

fn column(name: &str) -> String {
    format!("{}.{}", USERS_TABLE, name)
}

impl FromAnyRow for User {
    const ENTITY: &'static str = "user";

    fn from_row(row: &AnyRow, _dialect: &dyn Dialect) -> DatabaseResult<Self> {
        let status = get_text(row, 10, Self::ENTITY)?;
        let account_status = AccountStatus::from_str(&status).ok_or_else(|| {
            DatabaseError::scan(Self::ENTITY, format!("unknown account status {:?}", status))
        })?;

        Ok(User {
            id: get_i64(row, 0, Self::ENTITY)?,
            username: get_text(row, 1, Self::ENTITY)?,
            hashed_password: get_text(row, 2, Self::ENTITY)?,
            salt: get_bytes(row, 3, Self::ENTITY)?,
            requires_password_change: get_flag(row, 4, Self::ENTITY)?,
            password_last_changed_on: get_opt_i64(row, 5, Self::ENTITY)?,
            two_factor_secret: get_text(row, 6, Self::ENTITY)?,
            two_factor_secret_verified_on: get_opt_i64(row, 7, Self::ENTITY)?,
            is_admin: get_flag(row, 8, Self::ENTITY)?,
            admin_permissions: AdminPermissions::from_bits(get_i64(row, 9, Self::ENTITY)?),
            account_status,
            account_status_explanation: get_text(row, 11, Self::ENTITY)?,
            created_on: get_i64(row, 12, Self::ENTITY)?,
            last_updated_on: get_opt_i64(row, 13, Self::ENTITY)?,
            archived_on: get_opt_i64(row, 14, Self::ENTITY)?,
        })
    }
}

/// Live users, optionally restricted by two-factor verification
fn live_users(verified: Option<bool>) -> SelectBuilder {
    let builder = SelectBuilder::new(USERS_TABLE, columns())
        .filter(Predicate::is_null(column("archived_on")));

    match verified {
        Some(true) => builder.filter(Predicate::is_not_null(column("two_factor_secret_verified_on"))),
        Some(false) => builder.filter(Predicate::is_null(column("two_factor_secret_verified_on"))),
        None => builder,
    }
}

/// Standing a new user row starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InitialStanding {
    pub account_status: AccountStatus,
    pub two_factor_verified: bool,
    pub is_admin: bool,
    pub admin_permissions: AdminPermissions,
}

impl InitialStanding {
    /// A self-registered user awaiting two-factor verification
    pub fn registered() -> Self {
        Self {
            account_status: AccountStatus::Unverified,
            two_factor_verified: false,
            is_admin: false,
            admin_permissions: AdminPermissions::none(),
        }
    }
}

impl SqlQuerier {
    /// Inserts a user row and records its creation
    pub(crate) async fn insert_user(
        &self,
        input: &UserCreationInput,
        standing: InitialStanding,
    ) -> DatabaseResult<User> {
        input.validate()?;

        let builder = InsertBuilder::new(USERS_TABLE)
            .value("username", Value::arg(input.username.as_str()))
            .value("hashed_password", Value::arg(input.hashed_password.as_str()))
            .value("salt", Value::arg(input.salt.clone()))
            .value("requires_password_change", Value::arg(false))
            .value("two_factor_secret", Value::arg(input.two_factor_secret.as_str()))
            .value("is_admin", Value::arg(standing.is_admin))
            .value("admin_permissions", Value::arg(standing.admin_permissions.bits()))
            .value("account_status", Value::arg(standing.account_status.as_str()))
            .value("account_status_explanation", Value::arg(""));

        let stamped: &[&str] = if standing.two_factor_verified {
            &["created_on", "two_factor_secret_verified_on"]
        } else {
            &["created_on"]
        };
        let inserted = insert_row(&self.pool, self.dialect(), builder, stamped, User::ENTITY).await?;

        let user = User {
            id: inserted.id,
            username: input.username.clone(),
            hashed_password: input.hashed_password.clone(),
            salt: input.salt.clone(),
            requires_password_change: false,
            password_last_changed_on: None,
            two_factor_secret: input.two_factor_secret.clone(),
            two_factor_secret_verified_on: standing
                .two_factor_verified
                .then_some(inserted.created_on),
            is_admin: standing.is_admin,
            admin_permissions: standing.admin_permissions,
            account_status: standing.account_status,
            account_status_explanation: String::new(),
            created_on: inserted.created_on,
            last_updated_on: None,
            archived_on: None,
        };
        debug!(user_id = user.id, "User created");

        self.audit.record_event(build_user_created_event_entry(&user)).await;
        Ok(user)
    }
}

#[async_trait]
impl UserDataManager for SqlQuerier {
    async fn get_user(&self, user_id: i64) -> DatabaseResult<User> {
        self.fetch_one(live_users(Some(true)).filter(Predicate::eq(column("id"), user_id)))
            .await
    }

    async fn get_user_with_unverified_two_factor_secret(&self, user_id: i64) -> DatabaseResult<User> {
        self.fetch_one(live_users(Some(false)).filter(Predicate::eq(column("id"), user_id)))
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> DatabaseResult<User> {
        self.fetch_one(live_users(Some(true)).filter(Predicate::eq(column("username"), username)))
            .await
    }

    async fn search_for_users_by_username(&self, prefix: &str) -> DatabaseResult<Vec<User>> {
        let builder = live_users(Some(true))
            .filter(Predicate::starts_with(column("username"), prefix))
            .order_by(column("id"), SortOrder::Asc);

        self.fetch_all(builder).await
    }

    async fn get_all_users_count(&self) -> DatabaseResult<u64> {
        self.count_all(USERS_TABLE, User::ENTITY).await
    }

    async fn get_users(&self, filter: Option<&QueryFilter>) -> DatabaseResult<UserList> {
        let builder = SelectBuilder::new(USERS_TABLE, columns());

        let (users, pagination) = self.fetch_page(builder, filter, TableKind::Mutable).await?;
        Ok(UserList { pagination, users })
    }

    async fn get_all_users(
        &self,
        results: mpsc::Sender<Vec<User>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle> {
        self.export_table(USERS_TABLE, columns(), results, cancel).await
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    async fn create_user(&self, input: &UserCreationInput) -> DatabaseResult<User> {
        self.insert_user(input, InitialStanding::registered()).await
    }

    #[instrument(skip(self, user, changes), fields(user_id = user.id))]
    async fn update_user(&self, user: &mut User, changes: &[FieldChangeSummary]) -> DatabaseResult<()> {
        let builder = UpdateBuilder::new(USERS_TABLE)
            .set("username", Value::arg(user.username.as_str()))
            .set("hashed_password", Value::arg(user.hashed_password.as_str()))
            .set("requires_password_change", Value::arg(user.requires_password_change))
            .set("two_factor_secret", Value::arg(user.two_factor_secret.as_str()))
            .set(
                "two_factor_secret_verified_on",
                Value::arg(user.two_factor_secret_verified_on),
            )
            .filter(Predicate::eq("id", user.id))
            .filter(Predicate::is_null("archived_on"));

        let updated_on = self.update(builder, &["last_updated_on"], User::ENTITY).await?;
        user.last_updated_on = Some(updated_on);

        self.audit
            .record_event(build_user_updated_event_entry(user.id, changes))
            .await;
        Ok(())
    }

    #[instrument(skip(self, new_hash))]
    async fn update_user_password(&self, user_id: i64, new_hash: &str) -> DatabaseResult<()> {
        let builder = UpdateBuilder::new(USERS_TABLE)
            .set("hashed_password", Value::arg(new_hash))
            .set("requires_password_change", Value::arg(false))
            .filter(Predicate::eq("id", user_id))
            .filter(Predicate::is_null("archived_on"));

        self.update(
            builder,
            &["password_last_changed_on", "last_updated_on"],
            User::ENTITY,
        )
        .await?;

        self.audit
            .record_event(build_user_updated_password_event_entry(user_id))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn verify_user_two_factor_secret(&self, user_id: i64) -> DatabaseResult<()> {
        let builder = UpdateBuilder::new(USERS_TABLE)
            .set("account_status", Value::arg(AccountStatus::Good.as_str()))
            .filter(Predicate::eq("id", user_id))
            .filter(Predicate::is_null("two_factor_secret_verified_on"))
            .filter(Predicate::is_null("archived_on"));

        self.update(
            builder,
            &["two_factor_secret_verified_on", "last_updated_on"],
            User::ENTITY,
        )
        .await?;

        self.audit
            .record_event(build_user_verified_two_factor_secret_event_entry(user_id))
            .await;
        Ok(())
    }

    #[instrument(skip(self, reason))]
    async fn ban_user(&self, user_id: i64, banned_by: i64, reason: &str) -> DatabaseResult<()> {
        let builder = UpdateBuilder::new(USERS_TABLE)
            .set("account_status", Value::arg(AccountStatus::Banned.as_str()))
            .set("account_status_explanation", Value::arg(reason))
            .filter(Predicate::eq("id", user_id))
            .filter(Predicate::is_null("archived_on"));

        self.update(builder, &["last_updated_on"], User::ENTITY).await?;

        self.audit
            .record_event(build_user_banned_event_entry(user_id, banned_by, reason))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn archive_user(&self, user_id: i64) -> DatabaseResult<()> {
        self.archive(USERS_TABLE, vec![Predicate::eq("id", user_id)], User::ENTITY)
            .await?;

        self.audit
            .record_event(build_user_archived_event_entry(user_id))
            .await;
        Ok(())
    }

    async fn get_audit_log_entries_for_user(&self, user_id: i64) -> DatabaseResult<Vec<AuditLogEntry>> {
        self.audit_log_entries_matching(Predicate::or(vec![
            Predicate::json_key_equals("audit_log.context", USER_ASSIGNMENT_KEY, user_id),
            Predicate::json_key_equals("audit_log.context", PERFORMED_BY_KEY, user_id),
        ]))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dialect::{MariaDb, Postgres};

    #[test]
    fn test_verified_lookup_requires_verification() {
        let built = live_users(Some(true))
            .filter(Predicate::eq(column("id"), 4))
            .build(&Postgres)
            .unwrap();
        assert!(built.sql.ends_with(
            "WHERE users.archived_on IS NULL AND users.two_factor_secret_verified_on IS NOT NULL \
             AND users.id = $1"
        ));
    }

    #[test]
    fn test_search_uses_prefix_match() {
        let built = live_users(Some(true))
            .filter(Predicate::starts_with(column("username"), "ali"))
            .build(&MariaDb)
            .unwrap();
        assert!(built.sql.contains("users.username LIKE ?"));
        assert_eq!(built.args.last(), Some(&crate::db::query_builder::QueryArg::Text("ali%".to_string())));
    }

    #[test]
    fn test_registered_standing() {
        let standing = InitialStanding::registered();
        assert_eq!(standing.account_status, AccountStatus::Unverified);
        assert!(!standing.two_factor_verified);
        assert_eq!(standing.admin_permissions, AdminPermissions::none());
    }
}
