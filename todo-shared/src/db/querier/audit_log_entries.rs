use super::SqlQuerier;
use crate::audit::{
    build_banned_user_login_attempt_event, build_cycle_cookie_secret_event, build_logout_event,
    build_successful_login_event, build_unsuccessful_login_bad_2fa_token_event,
    build_unsuccessful_login_bad_password_event, build_user_updated_two_factor_secret_event_entry,
};
use crate::db::audit_logger::AUDIT_LOG_TABLE;
use crate::db::dialect::Dialect;
use crate::db::manager::{AuditLogEntryDataManager, ExportHandle};
use crate::db::query_builder::{Predicate, SelectBuilder, SortOrder};
use crate::db::scanner::{get_i64, get_text, FromAnyRow};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::query_filter::TableKind;
use crate::models::{
    AuditLogContext, AuditLogEntry, AuditLogEntryCreationInput, AuditLogEntryList, QueryFilter,
};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Column list; the JSON context is selected through the dialect
fn columns(dialect: &dyn Dialect) -> Vec<String> {
    vec![
        column("id"),
        column("event_type"),
        dialect.select_json(&column("context")),
        column("created_on"),
    ]
}

fn column(name: &str) -> String {
    format!("{}.{}", AUDIT_LOG_TABLE, name)
}

impl FromAnyRow for AuditLogEntry {
    const ENTITY: &'static str = "audit log entry";

    fn from_row(row: &AnyRow, _dialect: &dyn Dialect) -> DatabaseResult<Self> {
        let raw_context = get_text(row, 2, Self::ENTITY)?;
        let context: AuditLogContext = serde_json::from_str(&raw_context)
            .map_err(|e| DatabaseError::scan(Self::ENTITY, format!("context: {}", e)))?;

        Ok(AuditLogEntry {
            id: get_i64(row, 0, Self::ENTITY)?,
            event_type: get_text(row, 1, Self::ENTITY)?,
            context,
            created_on: get_i64(row, 3, Self::ENTITY)?,
        })
    }
}

impl SqlQuerier {
    /// Entries whose context matches `predicate`, oldest first
    pub(crate) async fn audit_log_entries_matching(
        &self,
        predicate: Predicate,
    ) -> DatabaseResult<Vec<AuditLogEntry>> {
        let builder = SelectBuilder::new(AUDIT_LOG_TABLE, columns(self.dialect()))
            .filter(predicate)
            .order_by(column("id"), SortOrder::Asc);

        self.fetch_all(builder).await
    }
}

#[async_trait]
impl AuditLogEntryDataManager for SqlQuerier {
    async fn get_audit_log_entry(&self, entry_id: i64) -> DatabaseResult<AuditLogEntry> {
        let builder = SelectBuilder::new(AUDIT_LOG_TABLE, columns(self.dialect()))
            .filter(Predicate::eq(column("id"), entry_id));

        self.fetch_one(builder).await
    }

    async fn get_all_audit_log_entries_count(&self) -> DatabaseResult<u64> {
        self.count_all(AUDIT_LOG_TABLE, AuditLogEntry::ENTITY).await
    }

    async fn get_audit_log_entries(
        &self,
        filter: Option<&QueryFilter>,
    ) -> DatabaseResult<AuditLogEntryList> {
        let builder = SelectBuilder::new(AUDIT_LOG_TABLE, columns(self.dialect()));

        let (entries, pagination) = self
            .fetch_page(builder, filter, TableKind::AppendOnly)
            .await?;
        Ok(AuditLogEntryList {
            pagination,
            entries,
        })
    }

    async fn get_all_audit_log_entries(
        &self,
        results: mpsc::Sender<Vec<AuditLogEntry>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle> {
        self.export_table(AUDIT_LOG_TABLE, columns(self.dialect()), results, cancel)
            .await
    }

    async fn create_audit_log_entry(
        &self,
        input: AuditLogEntryCreationInput,
    ) -> DatabaseResult<AuditLogEntry> {
        self.audit.create(input).await
    }

    async fn log_cycle_cookie_secret_event(&self, user_id: i64) {
        self.audit
            .record_event(build_cycle_cookie_secret_event(user_id))
            .await;
    }

    async fn log_successful_login_event(&self, user_id: i64) {
        self.audit
            .record_event(build_successful_login_event(user_id))
            .await;
    }

    async fn log_banned_user_login_attempt_event(&self, user_id: i64) {
        self.audit
            .record_event(build_banned_user_login_attempt_event(user_id))
            .await;
    }

    async fn log_unsuccessful_login_bad_password_event(&self, user_id: i64) {
        self.audit
            .record_event(build_unsuccessful_login_bad_password_event(user_id))
            .await;
    }

    async fn log_unsuccessful_login_bad_2fa_token_event(&self, user_id: i64) {
        self.audit
            .record_event(build_unsuccessful_login_bad_2fa_token_event(user_id))
            .await;
    }

    async fn log_logout_event(&self, user_id: i64) {
        self.audit.record_event(build_logout_event(user_id)).await;
    }

    async fn log_user_updated_two_factor_secret_event(&self, user_id: i64) {
        self.audit
            .record_event(build_user_updated_two_factor_secret_event_entry(user_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dialect::{MariaDb, Postgres, Sqlite};

    #[test]
    fn test_context_selected_as_text_on_postgres() {
        assert_eq!(columns(&Postgres)[2], "audit_log.context::text");
        assert_eq!(columns(&Sqlite)[2], "audit_log.context");
    }

    #[test]
    fn test_entries_for_user_query() {
        let predicate = Predicate::or(vec![
            Predicate::json_key_equals("audit_log.context", "user_id", 5),
            Predicate::json_key_equals("audit_log.context", "performed_by", 5),
        ]);

        let pg = SelectBuilder::new(AUDIT_LOG_TABLE, columns(&Postgres))
            .filter(predicate.clone())
            .build(&Postgres)
            .unwrap();
        assert!(pg.sql.ends_with(
            "WHERE (audit_log.context->>'user_id' = $1 OR audit_log.context->>'performed_by' = $2)"
        ));

        let maria = SelectBuilder::new(AUDIT_LOG_TABLE, columns(&MariaDb))
            .filter(predicate)
            .build(&MariaDb)
            .unwrap();
        assert!(maria.sql.ends_with(
            "WHERE (JSON_VALUE(audit_log.context, '$.user_id') = ? OR JSON_VALUE(audit_log.context, '$.performed_by') = ?)"
        ));
    }
}
