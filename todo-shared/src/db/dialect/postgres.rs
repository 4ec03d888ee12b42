use super::{Dialect, Provider};
use crate::db::query_builder::QueryArg;
use sqlx::migrate::Migrator;

/// PostgreSQL: `$n` placeholders, `RETURNING`, JSONB audit context
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn provider(&self) -> Provider {
        Provider::Postgres
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn current_unix_time(&self) -> &'static str {
        "CAST(extract(epoch FROM NOW()) AS BIGINT)"
    }

    fn case_insensitive_like(&self) -> &'static str {
        "ILIKE"
    }

    // JSONB has no Any mapping, so it travels as text both ways.
    fn select_json(&self, column: &str) -> String {
        format!("{}::text", column)
    }

    fn json_value(&self, placeholder: &str) -> String {
        format!("CAST({} AS JSONB)", placeholder)
    }

    fn json_key_equals(&self, column: &str, key: &str, placeholder: &str) -> String {
        format!("{}->>'{}' = {}", column, key, placeholder)
    }

    fn json_key_arg(&self, value: i64) -> QueryArg {
        QueryArg::Text(value.to_string())
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn unique_violation_codes(&self) -> &'static [&'static str] {
        &["23505"]
    }

    fn migrator(&self) -> Migrator {
        sqlx::migrate!("./migrations/postgres")
    }
}
