use super::{qualified, SqlQuerier};
use crate::audit::{
    build_webhook_archived_event_entry, build_webhook_created_event_entry,
    build_webhook_updated_event_entry, WEBHOOK_ASSIGNMENT_KEY,
};
use crate::db::dialect::Dialect;
use crate::db::manager::{ExportHandle, WebhookDataManager};
use crate::db::query_builder::{InsertBuilder, Predicate, SelectBuilder, UpdateBuilder, Value};
use crate::db::scanner::{get_i64, get_opt_i64, get_text, join_list, split_list, FromAnyRow};
use crate::error::DatabaseResult;
use crate::models::query_filter::TableKind;
use crate::models::{
    AuditLogEntry, FieldChangeSummary, QueryFilter, Webhook, WebhookCreationInput, WebhookList,
};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use validator::Validate;

pub(crate) const WEBHOOKS_TABLE: &str = "webhooks";

const WEBHOOKS_COLUMNS: [&str; 12] = [
    "id",
    "name",
    "content_type",
    "url",
    "method",
    "events",
    "data_types",
    "topics",
    "created_on",
    "last_updated_on",
    "archived_on",
    "belongs_to_user",
];

fn columns() -> Vec<String> {
    qualified(WEBHOOKS_TABLE, &WEBHOOKS_COLUMNS)
}

fn column(name: &str) -> String {
    format!("{}.{}", WEBHOOKS_TABLE, name)
}

impl FromAnyRow for Webhook {
    const ENTITY: &'static str = "webhook";

    fn from_row(row: &AnyRow, dialect: &dyn Dialect) -> DatabaseResult<Self> {
        let separator = dialect.list_separator();

        Ok(Webhook {
            id: get_i64(row, 0, Self::ENTITY)?,
            name: get_text(row, 1, Self::ENTITY)?,
            content_type: get_text(row, 2, Self::ENTITY)?,
            url: get_text(row, 3, Self::ENTITY)?,
            method: get_text(row, 4, Self::ENTITY)?,
            events: split_list(&get_text(row, 5, Self::ENTITY)?, separator),
            data_types: split_list(&get_text(row, 6, Self::ENTITY)?, separator),
            topics: split_list(&get_text(row, 7, Self::ENTITY)?, separator),
            created_on: get_i64(row, 8, Self::ENTITY)?,
            last_updated_on: get_opt_i64(row, 9, Self::ENTITY)?,
            archived_on: get_opt_i64(row, 10, Self::ENTITY)?,
            belongs_to_user: get_i64(row, 11, Self::ENTITY)?,
        })
    }
}

#[async_trait]
impl WebhookDataManager for SqlQuerier {
    async fn get_webhook(&self, webhook_id: i64, user_id: i64) -> DatabaseResult<Webhook> {
        let builder = SelectBuilder::new(WEBHOOKS_TABLE, columns())
            .filter(Predicate::eq(column("id"), webhook_id))
            .filter(Predicate::eq(column("belongs_to_user"), user_id))
            .filter(Predicate::is_null(column("archived_on")));

        self.fetch_one(builder).await
    }

    async fn get_all_webhooks_count(&self) -> DatabaseResult<u64> {
        self.count_all(WEBHOOKS_TABLE, Webhook::ENTITY).await
    }

    async fn get_webhooks(
        &self,
        user_id: i64,
        filter: Option<&QueryFilter>,
    ) -> DatabaseResult<WebhookList> {
        let builder = SelectBuilder::new(WEBHOOKS_TABLE, columns())
            .filter(Predicate::eq(column("belongs_to_user"), user_id));

        let (webhooks, pagination) = self.fetch_page(builder, filter, TableKind::Mutable).await?;
        Ok(WebhookList {
            pagination,
            webhooks,
        })
    }

    async fn get_all_webhooks(
        &self,
        results: mpsc::Sender<Vec<Webhook>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle> {
        self.export_table(WEBHOOKS_TABLE, columns(), results, cancel)
            .await
    }

    #[instrument(skip(self, input), fields(user_id = input.belongs_to_user))]
    async fn create_webhook(&self, input: &WebhookCreationInput) -> DatabaseResult<Webhook> {
        input.validate()?;
        let separator = self.dialect().list_separator();

        let builder = InsertBuilder::new(WEBHOOKS_TABLE)
            .value("name", Value::arg(input.name.as_str()))
            .value("content_type", Value::arg(input.content_type.as_str()))
            .value("url", Value::arg(input.url.as_str()))
            .value("method", Value::arg(input.method.as_str()))
            .value("events", Value::arg(join_list(&input.events, separator)))
            .value("data_types", Value::arg(join_list(&input.data_types, separator)))
            .value("topics", Value::arg(join_list(&input.topics, separator)))
            .value("belongs_to_user", Value::arg(input.belongs_to_user));
        let inserted = self.insert(builder, Webhook::ENTITY).await?;

        let webhook = Webhook {
            id: inserted.id,
            name: input.name.clone(),
            content_type: input.content_type.clone(),
            url: input.url.clone(),
            method: input.method.clone(),
            events: input.events.clone(),
            data_types: input.data_types.clone(),
            topics: input.topics.clone(),
            created_on: inserted.created_on,
            last_updated_on: None,
            archived_on: None,
            belongs_to_user: input.belongs_to_user,
        };
        debug!(webhook_id = webhook.id, "Webhook created");

        self.audit
            .record_event(build_webhook_created_event_entry(&webhook))
            .await;
        Ok(webhook)
    }

    #[instrument(skip(self, webhook, changes), fields(webhook_id = webhook.id))]
    async fn update_webhook(
        &self,
        webhook: &mut Webhook,
        changes: &[FieldChangeSummary],
    ) -> DatabaseResult<()> {
        let separator = self.dialect().list_separator();

        let builder = UpdateBuilder::new(WEBHOOKS_TABLE)
            .set("name", Value::arg(webhook.name.as_str()))
            .set("content_type", Value::arg(webhook.content_type.as_str()))
            .set("url", Value::arg(webhook.url.as_str()))
            .set("method", Value::arg(webhook.method.as_str()))
            .set("events", Value::arg(join_list(&webhook.events, separator)))
            .set("data_types", Value::arg(join_list(&webhook.data_types, separator)))
            .set("topics", Value::arg(join_list(&webhook.topics, separator)))
            .filter(Predicate::eq("id", webhook.id))
            .filter(Predicate::eq("belongs_to_user", webhook.belongs_to_user))
            .filter(Predicate::is_null("archived_on"));

        let updated_on = self
            .update(builder, &["last_updated_on"], Webhook::ENTITY)
            .await?;
        webhook.last_updated_on = Some(updated_on);

        self.audit
            .record_event(build_webhook_updated_event_entry(
                webhook.belongs_to_user,
                webhook.id,
                changes,
            ))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn archive_webhook(&self, webhook_id: i64, user_id: i64) -> DatabaseResult<()> {
        self.archive(
            WEBHOOKS_TABLE,
            vec![
                Predicate::eq("id", webhook_id),
                Predicate::eq("belongs_to_user", user_id),
            ],
            Webhook::ENTITY,
        )
        .await?;

        self.audit
            .record_event(build_webhook_archived_event_entry(user_id, webhook_id))
            .await;
        Ok(())
    }

    async fn get_audit_log_entries_for_webhook(
        &self,
        webhook_id: i64,
    ) -> DatabaseResult<Vec<AuditLogEntry>> {
        self.audit_log_entries_matching(Predicate::json_key_equals(
            "audit_log.context",
            WEBHOOK_ASSIGNMENT_KEY,
            webhook_id,
        ))
        .await
    }
}
