/// SQL-backed DataManager
///
/// [`SqlQuerier`] implements every entity trait of
/// [`DataManager`](crate::db::manager::DataManager) over one `AnyPool` and a
/// [`Dialect`]. The per-entity submodules hold the column lists, the row
/// scanners and the trait implementations; this module holds the write path
/// they share.
///
/// Mutations are two statements: the primary write, then a best-effort
/// audit write. They are not wrapped in a transaction.

mod audit_log_entries;
mod items;
mod oauth2_clients;
mod users;
mod webhooks;

pub(crate) use users::InitialStanding;

use crate::auth::Authenticator;
use crate::db::audit_logger::AuditLogger;
use crate::db::dialect::{dialect_for, Dialect};
use crate::db::exporter::{BatchExporter, ExportConfig, ExportSummary, IdBucket};
use crate::db::manager::DataManager;
use crate::db::migrations::{MigrationState, UserCreationConfig};
use crate::db::pool::{create_pool, ping_with_retry, DatabaseConfig};
use crate::db::query_builder::{InsertBuilder, Predicate, SelectBuilder, UpdateBuilder, Value};
use crate::db::scanner::{self, FromAnyRow};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::query_filter::{self, QueryFilter, TableKind};
use crate::models::Pagination;
use async_trait::async_trait;
use sqlx::AnyPool;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

/// Relational implementation of the data-access contract
#[derive(Debug)]
pub struct SqlQuerier {
    pub(crate) pool: AnyPool,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) config: DatabaseConfig,
    pub(crate) audit: AuditLogger,
    exporter: BatchExporter,
    pub(crate) migration_state: Mutex<MigrationState>,
}

impl SqlQuerier {
    /// Validates the configuration and builds a lazily connecting querier
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Configuration` for an invalid configuration and
    /// `DatabaseError::Query` if the pool cannot be created
    pub fn new(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate().map_err(DatabaseError::Configuration)?;

        let pool = create_pool(&config)
            .map_err(|e| DatabaseError::query("creating connection pool", e))?;

        Ok(Self::with_pool(pool, config))
    }

    /// Wraps an existing pool
    pub fn with_pool(pool: AnyPool, config: DatabaseConfig) -> Self {
        let dialect = dialect_for(config.provider);
        let exporter = BatchExporter::new(ExportConfig {
            bucket_size: config.export_bucket_size,
            max_concurrency: config.export_max_concurrency,
        });

        Self {
            audit: AuditLogger::new(pool.clone(), dialect.clone()),
            pool,
            dialect,
            config,
            exporter,
            migration_state: Mutex::new(MigrationState::NotMigrated),
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) async fn fetch_one<T: FromAnyRow>(&self, builder: SelectBuilder) -> DatabaseResult<T> {
        let query = builder
            .build(self.dialect())
            .map_err(DatabaseError::query_build)?;
        scanner::fetch_one(&self.pool, self.dialect(), &query).await
    }

    pub(crate) async fn fetch_all<T: FromAnyRow>(
        &self,
        builder: SelectBuilder,
    ) -> DatabaseResult<Vec<T>> {
        let query = builder
            .build(self.dialect())
            .map_err(DatabaseError::query_build)?;
        scanner::fetch_all(&self.pool, self.dialect(), &query).await
    }

    pub(crate) async fn exists(&self, builder: SelectBuilder, entity: &'static str) -> DatabaseResult<bool> {
        let query = builder
            .build_exists(self.dialect())
            .map_err(DatabaseError::query_build)?;
        scanner::fetch_exists(&self.pool, &query, entity).await
    }

    pub(crate) async fn count(&self, builder: SelectBuilder, entity: &'static str) -> DatabaseResult<u64> {
        let query = builder
            .build(self.dialect())
            .map_err(DatabaseError::query_build)?;
        scanner::fetch_count(&self.pool, &query, entity).await
    }

    /// `COUNT(id)` over every row of `table`, archived rows included
    pub(crate) async fn count_all(&self, table: &str, entity: &'static str) -> DatabaseResult<u64> {
        self.count(SelectBuilder::count(table), entity).await
    }

    /// Runs a filtered page query and its matching count
    pub(crate) async fn fetch_page<T: FromAnyRow>(
        &self,
        builder: SelectBuilder,
        filter: Option<&QueryFilter>,
        kind: TableKind,
    ) -> DatabaseResult<(Vec<T>, Pagination)> {
        let filter = query_filter::resolve(filter);

        let count_builder = builder.count_query();
        let total = self
            .count(filter.apply_predicates(count_builder, kind), T::ENTITY)
            .await?;
        let rows = self.fetch_all(filter.apply(builder, kind)).await?;

        Ok((rows, filter.pagination(total)))
    }

    /// Starts a bucketed export of every row in `table`
    ///
    /// The count and the highest ID are read before the workers start; rows
    /// inserted afterwards may or may not be included.
    pub(crate) async fn export_table<T>(
        &self,
        table: &'static str,
        columns: Vec<String>,
        results: mpsc::Sender<Vec<T>>,
        cancel: CancellationToken,
    ) -> DatabaseResult<JoinHandle<ExportSummary>>
    where
        T: FromAnyRow + Send + 'static,
    {
        let count = self.count_all(table, T::ENTITY).await?;
        let max_id = self.count(highest_id(table), T::ENTITY).await?;
        debug!(entity = T::ENTITY, count, max_id, "Exporting table");

        let pool = self.pool.clone();
        let dialect = self.dialect.clone();
        let columns = Arc::new(columns);

        let fetch = move |bucket: IdBucket| {
            let pool = pool.clone();
            let dialect = dialect.clone();
            let columns = columns.clone();

            async move {
                let [after, before] = bucket.predicates(table);
                let query = SelectBuilder::new(table, columns.iter().cloned())
                    .filter(after)
                    .filter(before)
                    .build(dialect.as_ref())
                    .map_err(DatabaseError::query_build)?;
                scanner::fetch_all::<T>(&pool, dialect.as_ref(), &query).await
            }
        };

        Ok(self.exporter.export(T::ENTITY, max_id, fetch, results, cancel))
    }

    pub(crate) async fn insert(
        &self,
        builder: InsertBuilder,
        entity: &'static str,
    ) -> DatabaseResult<Inserted> {
        insert_row(&self.pool, self.dialect(), builder, &["created_on"], entity).await
    }

    /// Runs an update that must touch exactly one live row
    ///
    /// Every column in `stamped` is set to the current time, and that time is
    /// returned. Zero affected rows is `NotFound`.
    pub(crate) async fn update(
        &self,
        builder: UpdateBuilder,
        stamped: &[&str],
        entity: &'static str,
    ) -> DatabaseResult<i64> {
        let dialect = self.dialect();

        if dialect.supports_returning() {
            let mut builder = builder;
            for column in stamped {
                builder = builder.set(*column, Value::CurrentTime);
            }
            let query = builder
                .returning(stamped.first().copied())
                .build(dialect)
                .map_err(DatabaseError::query_build)?;

            let row = query
                .query()
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| write_error(dialect, entity, "updating", e))?
                .ok_or(DatabaseError::NotFound)?;

            return scanner::get_i64(&row, 0, entity);
        }

        let now = current_unix_time();
        let mut builder = builder;
        for column in stamped {
            builder = builder.set(*column, Value::arg(now));
        }
        let query = builder.build(dialect).map_err(DatabaseError::query_build)?;

        let result = query
            .query()
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(dialect, entity, "updating", e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(now)
    }

    /// Stamps `archived_on` and `last_updated_on` on one live row of `table`
    pub(crate) async fn archive(
        &self,
        table: &str,
        predicates: Vec<Predicate>,
        entity: &'static str,
    ) -> DatabaseResult<i64> {
        let mut builder = UpdateBuilder::new(table);
        for predicate in predicates {
            builder = builder.filter(predicate);
        }
        builder = builder.filter(Predicate::is_null("archived_on"));

        self.update(builder, &["archived_on", "last_updated_on"], entity)
            .await
    }
}

#[async_trait]
impl DataManager for SqlQuerier {
    async fn is_ready(&self, max_attempts: u32) -> DatabaseResult<()> {
        if ping_with_retry(&self.pool, max_attempts, self.config.readiness_interval()).await {
            Ok(())
        } else {
            Err(DatabaseError::Unready {
                attempts: max_attempts,
            })
        }
    }

    #[instrument(skip_all)]
    async fn migrate(
        &self,
        authenticator: &dyn Authenticator,
        seed_user: Option<&UserCreationConfig>,
    ) -> DatabaseResult<()> {
        self.is_ready(self.config.readiness_max_attempts).await?;
        self.run_migrations().await?;

        if let Some(seed) = seed_user {
            seed.validate().map_err(DatabaseError::Configuration)?;
            self.seed_user(authenticator, seed).await?;
        }
        Ok(())
    }
}

/// Generated ID and creation time of an inserted row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Inserted {
    pub id: i64,
    pub created_on: i64,
}

/// Inserts one row, stamping `stamped` columns with the current time
///
/// Dialects with `RETURNING` read the ID and the first stamped column back
/// from the statement. The others bind a client-side timestamp and read the
/// driver's last-insert-id.
pub(crate) async fn insert_row(
    pool: &AnyPool,
    dialect: &dyn Dialect,
    builder: InsertBuilder,
    stamped: &[&str],
    entity: &'static str,
) -> DatabaseResult<Inserted> {
    let mut builder = builder;

    if dialect.supports_returning() {
        for column in stamped {
            builder = builder.value(*column, Value::CurrentTime);
        }
        let mut returning = vec!["id"];
        returning.extend(stamped.first().copied());

        let query = builder
            .returning(returning)
            .build(dialect)
            .map_err(DatabaseError::query_build)?;
        let row = query
            .query()
            .fetch_one(pool)
            .await
            .map_err(|e| write_error(dialect, entity, "creating", e))?;

        let id = scanner::get_i64(&row, 0, entity)?;
        let created_on = if stamped.is_empty() {
            current_unix_time()
        } else {
            scanner::get_i64(&row, 1, entity)?
        };
        return Ok(Inserted { id, created_on });
    }

    let now = current_unix_time();
    for column in stamped {
        builder = builder.value(*column, Value::arg(now));
    }
    let query = builder.build(dialect).map_err(DatabaseError::query_build)?;

    let result = query
        .query()
        .execute(pool)
        .await
        .map_err(|e| write_error(dialect, entity, "creating", e))?;

    match result.last_insert_id() {
        Some(id) => Ok(Inserted { id, created_on: now }),
        None => {
            error!(entity, "Driver reported no last insert ID");
            Err(DatabaseError::IdRetrieval { entity })
        }
    }
}

/// Maps a write failure, turning unique violations into `AlreadyExists`
pub(crate) fn write_error(
    dialect: &dyn Dialect,
    entity: &'static str,
    action: &str,
    err: sqlx::Error,
) -> DatabaseError {
    if dialect.is_unique_violation(&err) {
        debug!(entity, "Unique constraint violated");
        return DatabaseError::AlreadyExists { entity };
    }
    DatabaseError::query(format!("{} {}", action, entity), err)
}

/// Highest ID in `table`, 0 when it is empty
fn highest_id(table: &str) -> SelectBuilder {
    SelectBuilder::new(table, [format!("COALESCE(MAX({}.id), 0)", table)])
}

pub(crate) fn current_unix_time() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Timestamp columns that may be NULL, in any table
const NULLABLE_TIMESTAMPS: [&str; 4] = [
    "last_updated_on",
    "archived_on",
    "password_last_changed_on",
    "two_factor_secret_verified_on",
];

/// Table-qualified select list; nullable timestamps are coalesced
pub(crate) fn qualified(table: &str, columns: &[&str]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            let name = format!("{}.{}", table, column);
            if NULLABLE_TIMESTAMPS.contains(column) {
                scanner::nullable_timestamp(&name)
            } else {
                name
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dialect::Sqlite;

    #[test]
    fn test_qualified_columns() {
        assert_eq!(
            qualified("items", &["id", "name"]),
            vec!["items.id".to_string(), "items.name".to_string()]
        );
    }

    #[test]
    fn test_qualified_coalesces_nullable_timestamps() {
        assert_eq!(
            qualified("users", &["created_on", "password_last_changed_on", "archived_on"]),
            vec![
                "users.created_on".to_string(),
                "COALESCE(users.password_last_changed_on, -1)".to_string(),
                "COALESCE(users.archived_on, -1)".to_string(),
            ]
        );
    }

    #[test]
    fn test_highest_id_query_defaults_to_zero() {
        let built = highest_id("items").build(&Sqlite).unwrap();
        assert_eq!(built.sql, "SELECT COALESCE(MAX(items.id), 0) FROM items");
    }

    #[test]
    fn test_write_error_passes_other_errors_through() {
        let dialect = dialect_for(crate::db::dialect::Provider::Sqlite);
        let err = write_error(dialect.as_ref(), "item", "creating", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::Query { .. }));
        assert!(err.to_string().starts_with("creating item"));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = SqlQuerier::new(DatabaseConfig::default()).unwrap_err();
        assert!(matches!(err, DatabaseError::Configuration(_)));
    }
}
