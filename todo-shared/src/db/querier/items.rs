use super::{qualified, SqlQuerier};
use crate::audit::{
    build_item_archived_event_entry, build_item_created_event_entry,
    build_item_updated_event_entry, ITEM_ASSIGNMENT_KEY,
};
use crate::db::dialect::Dialect;
use crate::db::manager::{ExportHandle, ItemDataManager};
use crate::db::query_builder::{InsertBuilder, Predicate, SelectBuilder, SortOrder, UpdateBuilder, Value};
use crate::db::scanner::{get_i64, get_opt_i64, get_text, FromAnyRow};
use crate::error::DatabaseResult;
use crate::models::query_filter::TableKind;
use crate::models::{AuditLogEntry, FieldChangeSummary, Item, ItemCreationInput, ItemList, QueryFilter};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use validator::Validate;

pub(crate) const ITEMS_TABLE: &str = "items";

const ITEMS_COLUMNS: [&str; 7] = [
    "id",
    "name",
    "details",
    "created_on",
    "last_updated_on",
    "archived_on",
    "belongs_to_user",
];

fn columns() -> Vec<String> {
    qualified(ITEMS_TABLE, &ITEMS_COLUMNS)
}

fn column(name: &str) -> String {
    format!("{}.{}", ITEMS_TABLE, name)
}

impl FromAnyRow for Item {
    const ENTITY: &'static str = "item";

    fn from_row(row: &AnyRow, _dialect: &dyn Dialect) -> DatabaseResult<Self> {
        Ok(Item {
            id: get_i64(row, 0, Self::ENTITY)?,
            name: get_text(row, 1, Self::ENTITY)?,
            details: get_text(row, 2, Self::ENTITY)?,
            created_on: get_i64(row, 3, Self::ENTITY)?,
            last_updated_on: get_opt_i64(row, 4, Self::ENTITY)?,
            archived_on: get_opt_i64(row, 5, Self::ENTITY)?,
            belongs_to_user: get_i64(row, 6, Self::ENTITY)?,
        })
    }
}

/// Live item owned by `user_id`
fn owned_item(item_id: i64, user_id: i64) -> SelectBuilder {
    SelectBuilder::new(ITEMS_TABLE, columns())
        .filter(Predicate::eq(column("id"), item_id))
        .filter(Predicate::eq(column("belongs_to_user"), user_id))
        .filter(Predicate::is_null(column("archived_on")))
}

#[async_trait]
impl ItemDataManager for SqlQuerier {
    async fn item_exists(&self, item_id: i64, user_id: i64) -> DatabaseResult<bool> {
        self.exists(owned_item(item_id, user_id), Item::ENTITY).await
    }

    async fn get_item(&self, item_id: i64, user_id: i64) -> DatabaseResult<Item> {
        self.fetch_one(owned_item(item_id, user_id)).await
    }

    async fn get_all_items_count(&self) -> DatabaseResult<u64> {
        self.count_all(ITEMS_TABLE, Item::ENTITY).await
    }

    async fn get_items(&self, user_id: i64, filter: Option<&QueryFilter>) -> DatabaseResult<ItemList> {
        let builder = SelectBuilder::new(ITEMS_TABLE, columns())
            .filter(Predicate::eq(column("belongs_to_user"), user_id));

        let (items, pagination) = self.fetch_page(builder, filter, TableKind::Mutable).await?;
        Ok(ItemList { pagination, items })
    }

    async fn get_items_for_admin(&self, filter: Option<&QueryFilter>) -> DatabaseResult<ItemList> {
        let builder = SelectBuilder::new(ITEMS_TABLE, columns());

        let (items, pagination) = self.fetch_page(builder, filter, TableKind::Mutable).await?;
        Ok(ItemList { pagination, items })
    }

    async fn get_items_with_ids(&self, user_id: i64, ids: &[i64]) -> DatabaseResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let builder = SelectBuilder::new(ITEMS_TABLE, columns())
            .filter(Predicate::is_in(column("id"), ids.iter().copied()))
            .filter(Predicate::eq(column("belongs_to_user"), user_id))
            .filter(Predicate::is_null(column("archived_on")))
            .order_by(column("id"), SortOrder::Asc);

        self.fetch_all(builder).await
    }

    async fn get_all_items(
        &self,
        results: mpsc::Sender<Vec<Item>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<ExportHandle> {
        self.export_table(ITEMS_TABLE, columns(), results, cancel).await
    }

    #[instrument(skip(self, input), fields(user_id = input.belongs_to_user))]
    async fn create_item(&self, input: &ItemCreationInput) -> DatabaseResult<Item> {
        input.validate()?;

        let builder = InsertBuilder::new(ITEMS_TABLE)
            .value("name", Value::arg(input.name.as_str()))
            .value("details", Value::arg(input.details.as_str()))
            .value("belongs_to_user", Value::arg(input.belongs_to_user));
        let inserted = self.insert(builder, Item::ENTITY).await?;

        let item = Item {
            id: inserted.id,
            name: input.name.clone(),
            details: input.details.clone(),
            created_on: inserted.created_on,
            last_updated_on: None,
            archived_on: None,
            belongs_to_user: input.belongs_to_user,
        };
        debug!(item_id = item.id, "Item created");

        self.audit.record_event(build_item_created_event_entry(&item)).await;
        Ok(item)
    }

    #[instrument(skip(self, item, changes), fields(item_id = item.id))]
    async fn update_item(&self, item: &mut Item, changes: &[FieldChangeSummary]) -> DatabaseResult<()> {
        let builder = UpdateBuilder::new(ITEMS_TABLE)
            .set("name", Value::arg(item.name.as_str()))
            .set("details", Value::arg(item.details.as_str()))
            .filter(Predicate::eq("id", item.id))
            .filter(Predicate::eq("belongs_to_user", item.belongs_to_user))
            .filter(Predicate::is_null("archived_on"));

        item.last_updated_on = Some(self.update(builder, &["last_updated_on"], Item::ENTITY).await?);

        self.audit
            .record_event(build_item_updated_event_entry(
                item.belongs_to_user,
                item.id,
                changes,
            ))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn archive_item(&self, item_id: i64, user_id: i64) -> DatabaseResult<()> {
        self.archive(
            ITEMS_TABLE,
            vec![
                Predicate::eq("id", item_id),
                Predicate::eq("belongs_to_user", user_id),
            ],
            Item::ENTITY,
        )
        .await?;

        self.audit
            .record_event(build_item_archived_event_entry(user_id, item_id))
            .await;
        Ok(())
    }

    async fn get_audit_log_entries_for_item(&self, item_id: i64) -> DatabaseResult<Vec<AuditLogEntry>> {
        self.audit_log_entries_matching(Predicate::json_key_equals(
            "audit_log.context",
            ITEM_ASSIGNMENT_KEY,
            item_id,
        ))
        .await
    }
}
