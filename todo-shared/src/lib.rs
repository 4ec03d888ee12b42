//! # Todo Shared Library
//!
//! The data layer of the todo service: users, their items, webhooks and
//! OAuth2 clients, plus the audit trail that records every change to them.
//! Everything sits behind [`db::DataManager`], which speaks Postgres, MariaDB
//! or SQLite depending on configuration.
//!
//! ## Module Organization
//!
//! - `models`: entities, creation inputs, list pages and query filters
//! - `db`: the data manager, dialects, query building and migrations
//! - `audit`: audit event constructors
//! - `auth`: password hashing for the seed user
//! - `config`: layered configuration loading
//! - `error`: the data-layer error type

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

/// Current version of the todo shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
