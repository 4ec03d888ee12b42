use super::{qualified, SqlQuerier};
use crate::audit::{
    build_oauth2_client_archived_event_entry, build_oauth2_client_created_event_entry,
    build_oauth2_client_updated_event_entry, OAUTH2_CLIENT_ASSIGNMENT_KEY,
};
use crate::db::dialect::Dialect;
use crate::db::manager::{ExportHandle, OAuth2ClientDataManager};
use crate::db::query_builder::{InsertBuilder, Predicate, SelectBuilder, UpdateBuilder, Value};
use crate::db::scanner::{
    get_flag, get_i64, get_opt_i64, get_text, join_list, split_list, FromAnyRow,
};
use crate::error::DatabaseResult;
use crate::models::query_filter::TableKind;
use crate::models::{
    AuditLogEntry, FieldChangeSummary, OAuth2Client, OAuth2ClientCreationInput, OAuth2ClientList,
    QueryFilter,
};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use validator::Validate;

pub(crate) const OAUTH2_CLIENTS_TABLE: &str = "oauth2_clients";

const OAUTH2_CLIENTS_COLUMNS: [&str; 11] = [
    "id",
    "name",
    "client_id",
    "client_secret",
    "redirect_uri",
    "scopes",
    "implicit_allowed",
    "created_on",
    "last_updated_on",
    "archived_on",
    "belongs_to_user",
];

fn columns() -> Vec<String> {
    qualified(OAUTH2_CLIENTS_TABLE, &OAUTH2_CLIENTS_COLUMNS)
}

fn column(name: &str) -> String {
    format!("{}.{}", OAUTH2_CLIENTS_TABLE, name)
}

impl FromAnyRow for OAuth2Client {
    const ENTITY: &'static str = "oauth2 client";

    fn from_row(row: &AnyRow, dialect: &dyn Dialect) -> DatabaseResult<Self> {
        Ok(OAuth2Client {
            id: get_i64(row, 0, Self::ENTITY)?,
            name: get_text(row, 1, Self::ENTITY)?,
            client_id: get_text(row, 2, Self::ENTITY)?,
            client_secret: get_text(row, 3, Self::ENTITY)?,
            redirect_uri: get_text(row, 4, Self::ENTITY)?,
            scopes: split_list(&get_text(row, 5, Self::ENTITY)?, dialect.list_separator()),
            implicit_allowed: get_flag(row, 6, Self::ENTITY)?,
            created_on: get_i64(row, 7, Self::ENTITY)?,
            last_updated_on: get_opt_i64(row, 8, Self::ENTITY)?,
            archived_on: get_opt_i64(row, 9, Self::ENTITY)?,
            belongs_to_user: get_i64(row, 10, Self::ENTITY)?,
        })
    }
}

#[async_trait]
impl OAuth2ClientDataManager for SqlQuerier {
    async fn get_oauth2_client(&self, client_id: i64, user_id: i64) -> DatabaseResult<OAuth2Client> {
        let builder = SelectBuilder::new(OAUTH2_CLIENTS_TABLE, columns())
            .filter(Predicate::eq(column("id"), client_id))
            .filter(Predicate::eq(column("belongs_to_user"), user_id))
            .filter(Predicate::is_null(column("archived_on")));

        self.fetch_one(builder).await
    }

    async fn get_oauth2_client_by_client_id(&self, client_id: &str) -> DatabaseResult<OAuth2Client> {
        let builder = SelectBuilder::new(OAUTH2_CLIENTS_TABLE, columns())
            .filter(Predicate::eq(column("client_id"), client_id))
            .filter(Predicate::is_null(column("archived_on")));

        self.fetch_one(builder).await
    }

    async fn get_all_oauth2_clients_count(&self) -> DatabaseResult<u64> {
        self.count_all(OAUTH2_CLIENTS_TABLE, OAuth2Client::ENTITY)
            .await
    }

    async fn get_oauth2_clients(
        &self,
        user_id: i64,
        filter: Option<&QueryFilter>,
    ) -> DatabaseResult<OAuth2ClientList> {
        let builder = SelectBuilder::new(OAUTH2_CLIENTS_TABLE, columns())
            .filter(Predicate::eq(column("belongs_to_user"), user_id));

        let (clients, pagination) = self.fetch_page(builder, filter, TableKind::Mutable).await?;
        Ok(OAuth2ClientList {
            pagination,
            clients,
        })
    }

    async fn get_all_oauth2_clients(
        &self,
        results: mpsc::Sender<Vec<OAuth2Client>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle> {
        self.export_table(OAUTH2_CLIENTS_TABLE, columns(), results, cancel)
            .await
    }

    #[instrument(skip(self, input), fields(user_id = input.belongs_to_user))]
    async fn create_oauth2_client(
        &self,
        input: &OAuth2ClientCreationInput,
    ) -> DatabaseResult<OAuth2Client> {
        input.validate()?;

        let builder = InsertBuilder::new(OAUTH2_CLIENTS_TABLE)
            .value("name", Value::arg(input.name.as_str()))
            .value("client_id", Value::arg(input.client_id.as_str()))
            .value("client_secret", Value::arg(input.client_secret.as_str()))
            .value("redirect_uri", Value::arg(input.redirect_uri.as_str()))
            .value(
                "scopes",
                Value::arg(join_list(&input.scopes, self.dialect().list_separator())),
            )
            .value("implicit_allowed", Value::arg(input.implicit_allowed))
            .value("belongs_to_user", Value::arg(input.belongs_to_user));
        let inserted = self.insert(builder, OAuth2Client::ENTITY).await?;

        let client = OAuth2Client {
            id: inserted.id,
            name: input.name.clone(),
            client_id: input.client_id.clone(),
            client_secret: input.client_secret.clone(),
            redirect_uri: input.redirect_uri.clone(),
            scopes: input.scopes.clone(),
            implicit_allowed: input.implicit_allowed,
            created_on: inserted.created_on,
            last_updated_on: None,
            archived_on: None,
            belongs_to_user: input.belongs_to_user,
        };
        debug!(oauth2_client_id = client.id, "OAuth2 client created");

        self.audit
            .record_event(build_oauth2_client_created_event_entry(&client))
            .await;
        Ok(client)
    }

    #[instrument(skip(self, client, changes), fields(oauth2_client_id = client.id))]
    async fn update_oauth2_client(
        &self,
        client: &mut OAuth2Client,
        changes: &[FieldChangeSummary],
    ) -> DatabaseResult<()> {
        let builder = UpdateBuilder::new(OAUTH2_CLIENTS_TABLE)
            .set("name", Value::arg(client.name.as_str()))
            .set("redirect_uri", Value::arg(client.redirect_uri.as_str()))
            .set(
                "scopes",
                Value::arg(join_list(&client.scopes, self.dialect().list_separator())),
            )
            .set("implicit_allowed", Value::arg(client.implicit_allowed))
            .filter(Predicate::eq("id", client.id))
            .filter(Predicate::eq("belongs_to_user", client.belongs_to_user))
            .filter(Predicate::is_null("archived_on"));

        let updated_on = self
            .update(builder, &["last_updated_on"], OAuth2Client::ENTITY)
            .await?;
        client.last_updated_on = Some(updated_on);

        self.audit
            .record_event(build_oauth2_client_updated_event_entry(
                client.belongs_to_user,
                client.id,
                changes,
            ))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn archive_oauth2_client(&self, client_id: i64, user_id: i64) -> DatabaseResult<()> {
        self.archive(
            OAUTH2_CLIENTS_TABLE,
            vec![
                Predicate::eq("id", client_id),
                Predicate::eq("belongs_to_user", user_id),
            ],
            OAuth2Client::ENTITY,
        )
        .await?;

        self.audit
            .record_event(build_oauth2_client_archived_event_entry(user_id, client_id))
            .await;
        Ok(())
    }

    async fn get_audit_log_entries_for_oauth2_client(
        &self,
        client_id: i64,
    ) -> DatabaseResult<Vec<AuditLogEntry>> {
        self.audit_log_entries_matching(Predicate::json_key_equals(
            "audit_log.context",
            OAUTH2_CLIENT_ASSIGNMENT_KEY,
            client_id,
        ))
        .await
    }
}
