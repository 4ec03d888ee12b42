/// Database layer for the todo service
///
/// A dialect-neutral data manager over one `sqlx::AnyPool`. Postgres,
/// MariaDB and SQLite differ only in what the [`dialect::Dialect`] strategy
/// tells the query builder, the scanner and the migrator.
///
/// # Modules
///
/// - `manager`: the `DataManager` traits and the provider factory
/// - `querier`: the single SQL implementation of those traits
/// - `dialect`: per-provider placeholders, JSON access and migrations
/// - `query_builder`: composable SELECT/INSERT/UPDATE with pagination filters
/// - `scanner`: tolerant row decoding shared by every entity
/// - `audit_logger`: audit trail writes that never fail the caller
/// - `exporter`: concurrent full-table export in ID buckets
/// - `migrations`: migration state and seed user creation
/// - `pool`: connection pool configuration and readiness checks
///
/// # Example
///
/// ```no_run
/// use todo_shared::db::{provide_data_manager, DatabaseConfig};
/// use todo_shared::auth::password::Argon2Authenticator;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let manager = provide_data_manager(&config)?;
///     manager.migrate(&Argon2Authenticator::default(), None).await?;
///     println!("{} items", manager.get_all_items_count().await?);
///     Ok(())
/// }
/// ```

pub mod audit_logger;
pub mod dialect;
pub mod exporter;
pub mod manager;
pub mod migrations;
pub mod pool;
pub mod querier;
pub mod query_builder;
pub mod scanner;

pub use dialect::Provider;
pub use exporter::{ExportConfig, ExportSummary};
pub use manager::{provide_data_manager, DataManager, ExportHandle};
pub use migrations::{MigrationState, UserCreationConfig};
pub use pool::DatabaseConfig;
pub use querier::SqlQuerier;
