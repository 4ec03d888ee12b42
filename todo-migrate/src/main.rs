//! # Todo Migrate
//!
//! Startup tool for the todo data layer. It waits for the configured store,
//! applies pending schema migrations, creates the seed user if one is
//! configured and reports how many rows each table holds.
//!
//! ## Usage
//!
//! ```bash
//! TODO__DATABASE__PROVIDER=sqlite \
//! TODO__DATABASE__URL=sqlite://todo.db?mode=rwc \
//! TODO__SEED_USER__USERNAME=admin \
//! TODO__SEED_USER__PASSWORD=change-me \
//! TODO__SEED_USER__IS_ADMIN=true \
//!     cargo run -p todo-migrate
//! ```

use anyhow::Context;
use todo_shared::auth::password::Argon2Authenticator;
use todo_shared::config::{AppConfig, LogFormat};
use todo_shared::db::provide_data_manager;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "todo_migrate=debug,todo_shared=debug".into()),
    );

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Loading configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        provider = %config.database.provider,
        "Todo Migrate v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let manager = provide_data_manager(&config.database)?;
    manager
        .migrate(&Argon2Authenticator::default(), config.seed_user.as_ref())
        .await
        .context("Migrating database")?;

    tracing::info!(
        users = manager.get_all_users_count().await?,
        items = manager.get_all_items_count().await?,
        webhooks = manager.get_all_webhooks_count().await?,
        oauth2_clients = manager.get_all_oauth2_clients_count().await?,
        audit_log_entries = manager.get_all_audit_log_entries_count().await?,
        "Database is ready"
    );

    Ok(())
}
