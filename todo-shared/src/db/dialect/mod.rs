/// SQL dialect strategies
///
/// One [`Dialect`] implementation exists per supported store. The querier core
/// never branches on the provider directly; everything that differs between
/// stores (placeholders, current-time expression, JSON syntax, ID retrieval,
/// unique-violation codes, migration scripts) is answered here.

mod mariadb;
mod postgres;
mod sqlite;

pub use mariadb::MariaDb;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::db::query_builder::QueryArg;
use serde::{Deserialize, Serialize};
use sqlx::migrate::Migrator;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported database providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Postgres,
    #[serde(alias = "mysql")]
    MariaDb,
    Sqlite,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Postgres => "postgres",
            Provider::MariaDb => "mariadb",
            Provider::Sqlite => "sqlite",
        }
    }

    /// URL schemes sqlx accepts for this provider
    pub fn url_schemes(&self) -> &'static [&'static str] {
        match self {
            Provider::Postgres => &["postgres", "postgresql"],
            Provider::MariaDb => &["mysql", "mariadb"],
            Provider::Sqlite => &["sqlite"],
        }
    }

    /// Returns true if `url` uses one of this provider's schemes
    pub fn accepts_url(&self, url: &str) -> bool {
        url.split_once(':')
            .map(|(scheme, _)| self.url_schemes().iter().any(|s| *s == scheme))
            .unwrap_or(false)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Provider::Postgres),
            "mariadb" | "mysql" => Ok(Provider::MariaDb),
            "sqlite" => Ok(Provider::Sqlite),
            other => Err(format!("Unknown database provider: {}", other)),
        }
    }
}

/// Per-store SQL strategy
pub trait Dialect: Send + Sync + fmt::Debug {
    fn provider(&self) -> Provider;

    /// Placeholder for the 1-based argument `position`
    fn placeholder(&self, position: usize) -> String;

    /// Expression evaluating to the current unix time in seconds
    fn current_unix_time(&self) -> &'static str;

    fn case_insensitive_like(&self) -> &'static str {
        "LIKE"
    }

    /// Select expression yielding a JSON column as text
    fn select_json(&self, column: &str) -> String {
        column.to_string()
    }

    /// Expression storing a bound JSON string into a JSON column
    fn json_value(&self, placeholder: &str) -> String {
        placeholder.to_string()
    }

    /// Predicate comparing one key of a JSON object column to a bound value
    fn json_key_equals(&self, column: &str, key: &str, placeholder: &str) -> String;

    /// Argument compared against by [`Dialect::json_key_equals`]
    fn json_key_arg(&self, value: i64) -> QueryArg {
        QueryArg::Int(value)
    }

    /// Whether INSERT/UPDATE can return generated columns.
    /// Dialects without it fall back to last-insert-id.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Separator for list fields persisted as joined strings
    fn list_separator(&self) -> &'static str {
        crate::models::LIST_SEPARATOR
    }

    /// Driver error codes that signal a unique-constraint violation
    fn unique_violation_codes(&self) -> &'static [&'static str];

    fn is_unique_violation(&self, err: &sqlx::Error) -> bool {
        let Some(db_err) = err.as_database_error() else {
            return false;
        };
        if db_err.is_unique_violation() {
            return true;
        }
        db_err
            .code()
            .map(|code| self.unique_violation_codes().iter().any(|c| *c == code))
            .unwrap_or(false)
    }

    /// Embedded, ordered migration scripts for this store
    fn migrator(&self) -> Migrator;
}

/// Returns the dialect strategy for a provider
pub fn dialect_for(provider: Provider) -> Arc<dyn Dialect> {
    match provider {
        Provider::Postgres => Arc::new(Postgres),
        Provider::MariaDb => Arc::new(MariaDb),
        Provider::Sqlite => Arc::new(Sqlite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("postgres".parse::<Provider>(), Ok(Provider::Postgres));
        assert_eq!("MySQL".parse::<Provider>(), Ok(Provider::MariaDb));
        assert_eq!("sqlite".parse::<Provider>(), Ok(Provider::Sqlite));
        assert!("oracle".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_accepts_url() {
        assert!(Provider::Postgres.accepts_url("postgresql://localhost/todo"));
        assert!(Provider::MariaDb.accepts_url("mysql://root@localhost/todo"));
        assert!(Provider::Sqlite.accepts_url("sqlite::memory:"));
        assert!(!Provider::Sqlite.accepts_url("postgres://localhost/todo"));
        assert!(!Provider::Postgres.accepts_url("not a url"));
    }

    #[test]
    fn test_provider_deserializes_alias() {
        let provider: Provider = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(provider, Provider::MariaDb);
    }

    #[test]
    fn test_dialect_for_matches_provider() {
        for provider in [Provider::Postgres, Provider::MariaDb, Provider::Sqlite] {
            assert_eq!(dialect_for(provider).provider(), provider);
        }
    }

    #[test]
    fn test_mariadb_is_the_only_dialect_without_returning() {
        assert!(dialect_for(Provider::Postgres).supports_returning());
        assert!(dialect_for(Provider::Sqlite).supports_returning());
        assert!(!dialect_for(Provider::MariaDb).supports_returning());
    }
}
