use super::{Dialect, Provider};
use sqlx::migrate::Migrator;
use sqlx::mysql::MySqlDatabaseError;

const ER_DUP_ENTRY: u16 = 1062;

/// MariaDB / MySQL: `?` placeholders, last-insert-id
#[derive(Debug, Clone, Copy, Default)]
pub struct MariaDb;

impl Dialect for MariaDb {
    fn provider(&self) -> Provider {
        Provider::MariaDb
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn current_unix_time(&self) -> &'static str {
        "UNIX_TIMESTAMP()"
    }

    fn json_key_equals(&self, column: &str, key: &str, placeholder: &str) -> String {
        format!("JSON_VALUE({}, '$.{}') = {}", column, key, placeholder)
    }

    fn unique_violation_codes(&self) -> &'static [&'static str] {
        &["1062"]
    }

    fn is_unique_violation(&self, err: &sqlx::Error) -> bool {
        let Some(db_err) = err.as_database_error() else {
            return false;
        };
        // code() reports the SQLSTATE, which is shared with FK failures.
        db_err.is_unique_violation()
            || db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number() == ER_DUP_ENTRY)
                .unwrap_or(false)
    }

    fn migrator(&self) -> Migrator {
        sqlx::migrate!("./migrations/mariadb")
    }
}
