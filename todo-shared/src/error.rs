/// Error types for the data-access layer
///
/// Callers are expected to branch on [`DatabaseError::NotFound`] and
/// [`DatabaseError::AlreadyExists`] only. Everything else carries context for
/// logs and is surfaced opaquely.

use crate::db::query_builder::{log_query_building_error, QueryBuildError};

/// Convenience alias used throughout the data-access layer
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error type for every DataManager operation
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Zero rows were returned or affected
    #[error("Record not found")]
    NotFound,

    /// A uniqueness constraint was violated (duplicate username or client ID)
    #[error("{entity} already exists")]
    AlreadyExists {
        /// Entity kind that collided, e.g. "user"
        entity: &'static str,
    },

    /// SQL assembly failed. The details are logged to the query-building
    /// sink and never shown to callers.
    #[error("Internal error building query")]
    QueryBuild(#[source] QueryBuildError),

    /// A row did not have the shape the scanner expected
    #[error("Failed to scan {entity} row: {reason}")]
    Scan {
        /// Entity being scanned
        entity: &'static str,
        /// What went wrong
        reason: String,
    },

    /// Any other driver failure
    #[error("{context}: {source}")]
    Query {
        /// What the layer was doing
        context: String,
        /// Underlying driver error
        #[source]
        source: sqlx::Error,
    },

    /// The store did not report a generated ID for an insert
    #[error("Failed to retrieve generated ID for {entity}")]
    IdRetrieval {
        /// Entity that was inserted
        entity: &'static str,
    },

    /// The store never became reachable within the readiness window
    #[error("Database is not ready after {attempts} attempts")]
    Unready {
        /// Number of pings attempted
        attempts: u32,
    },

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Input failed validation before reaching the store
    #[error("Invalid input: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The authenticator could not hash the seed user's password
    #[error("Failed to hash password: {0}")]
    PasswordHashing(String),

    /// Invalid configuration (unknown provider, mismatched URL scheme)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Wraps a driver error with context, mapping `RowNotFound` to [`DatabaseError::NotFound`]
    pub fn query(context: impl Into<String>, source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            source => DatabaseError::Query {
                context: context.into(),
                source,
            },
        }
    }

    /// Reports an assembly defect to the query-building sink and wraps it
    pub fn query_build(err: QueryBuildError) -> Self {
        log_query_building_error(&err);
        DatabaseError::QueryBuild(err)
    }

    /// Builds a scan error for the given entity
    pub fn scan(entity: &'static str, reason: impl std::fmt::Display) -> Self {
        DatabaseError::Scan {
            entity,
            reason: reason.to_string(),
        }
    }

    /// Returns true for the not-found sentinel
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound)
    }

    /// Returns true for the uniqueness-conflict sentinel
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DatabaseError::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = DatabaseError::query("fetching item", sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_errors_keep_context() {
        let err = DatabaseError::query("fetching item", sqlx::Error::PoolTimedOut);
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("fetching item: "));
    }

    #[test]
    fn test_query_build_error_is_opaque() {
        let err = DatabaseError::QueryBuild(QueryBuildError::NoColumns {
            table: "items".to_string(),
        });
        assert_eq!(err.to_string(), "Internal error building query");
    }

    #[test]
    fn test_already_exists_display() {
        let err = DatabaseError::AlreadyExists { entity: "user" };
        assert!(err.is_already_exists());
        assert_eq!(err.to_string(), "user already exists");
    }
}
