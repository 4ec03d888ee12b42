use super::{Dialect, Provider};
use sqlx::migrate::Migrator;

/// SQLite 3.35+: `?n` placeholders, `RETURNING`, JSON1 functions
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    fn placeholder(&self, position: usize) -> String {
        format!("?{}", position)
    }

    fn current_unix_time(&self) -> &'static str {
        "CAST(strftime('%s','now') AS INTEGER)"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn json_key_equals(&self, column: &str, key: &str, placeholder: &str) -> String {
        format!("json_extract({}, '$.{}') = {}", column, key, placeholder)
    }

    // SQLITE_CONSTRAINT_UNIQUE, SQLITE_CONSTRAINT_PRIMARYKEY
    fn unique_violation_codes(&self) -> &'static [&'static str] {
        &["2067", "1555"]
    }

    fn migrator(&self) -> Migrator {
        sqlx::migrate!("./migrations/sqlite")
    }
}
