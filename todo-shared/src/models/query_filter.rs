/// Pagination and range filtering for list queries
///
/// A filter appends range predicates, the archive predicate, primary-key
/// ordering and `LIMIT`/`OFFSET` to a [`SelectBuilder`]. Count queries take
/// the predicates only.
///
/// A missing filter behaves like `QueryFilter::default()`: no range
/// predicates, first page, default limit, archived rows excluded.

use crate::db::query_builder::{Predicate, SelectBuilder, SortOrder};
use serde::{Deserialize, Serialize};

/// Page size used when a filter asks for `limit = 0`
pub const DEFAULT_LIMIT: u8 = 20;

/// Largest page size a filter may request
pub const MAX_LIMIT: u8 = 250;

/// Whether a table has the mutable-entity timestamp columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Has `last_updated_on` and `archived_on`
    Mutable,
    /// Has `created_on` only (the audit log)
    AppendOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    /// 1-based page number; 0 is treated as 1
    pub page: u64,

    /// Page size; 0 resolves to [`DEFAULT_LIMIT`], capped at [`MAX_LIMIT`]
    pub limit: u8,

    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
    pub updated_after: Option<i64>,
    pub updated_before: Option<i64>,
    pub include_archived: bool,
    pub sort_by: SortOrder,
}

/// Page metadata returned alongside list results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u8,
    pub total_count: u64,
}

impl QueryFilter {
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u8 {
        match self.limit {
            0 => DEFAULT_LIMIT,
            limit => limit.min(MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1) * u64::from(self.limit())
    }

    /// Appends range and archive predicates, but no ordering or paging
    pub fn apply_predicates(&self, mut builder: SelectBuilder, kind: TableKind) -> SelectBuilder {
        let table = builder.table().to_string();
        let column = |name: &str| format!("{}.{}", table, name);

        if let Some(after) = self.created_after {
            builder = builder.filter(Predicate::gt(column("created_on"), after));
        }
        if let Some(before) = self.created_before {
            builder = builder.filter(Predicate::lt(column("created_on"), before));
        }

        if kind == TableKind::Mutable {
            if let Some(after) = self.updated_after {
                builder = builder.filter(Predicate::gt(column("last_updated_on"), after));
            }
            if let Some(before) = self.updated_before {
                builder = builder.filter(Predicate::lt(column("last_updated_on"), before));
            }
            if !self.include_archived {
                builder = builder.filter(Predicate::is_null(column("archived_on")));
            }
        }

        builder
    }

    /// Appends predicates, `ORDER BY <table>.id` and paging
    pub fn apply(&self, builder: SelectBuilder, kind: TableKind) -> SelectBuilder {
        let order_column = format!("{}.id", builder.table());
        self.apply_predicates(builder, kind)
            .order_by(order_column, self.sort_by)
            .limit(u64::from(self.limit()))
            .offset(self.offset())
    }

    pub fn pagination(&self, total_count: u64) -> Pagination {
        Pagination {
            page: self.page(),
            limit: self.limit(),
            total_count,
        }
    }
}

/// Resolves an optional filter to the one that will be applied
pub fn resolve(filter: Option<&QueryFilter>) -> QueryFilter {
    filter.cloned().unwrap_or_default()
}
