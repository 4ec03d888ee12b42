/// Row scanning
///
/// Rows are read positionally, in the order of each entity's column list.
/// The helpers here absorb the encoding differences between providers:
/// booleans come back as integers from MariaDB and SQLite, and MariaDB
/// reports some text columns as blobs.
///
/// The `Any` driver cannot decode a SQLite NULL into `Option<i64>`, so
/// nullable timestamps are selected through [`nullable_timestamp`] and come
/// back as [`NULL_TIMESTAMP`] instead.
///
/// List results are streamed row by row. Dropping the stream (on success,
/// error or early return) hands the connection back to the pool.

use crate::db::dialect::Dialect;
use crate::db::query_builder::BuiltQuery;
use crate::error::{DatabaseError, DatabaseResult};
use futures::TryStreamExt;
use sqlx::any::AnyRow;
use sqlx::AnyPool;
use sqlx::Row;

/// Entities that can be decoded from a positional row
pub trait FromAnyRow: Sized {
    /// Entity name used in errors and logs
    const ENTITY: &'static str;

    fn from_row(row: &AnyRow, dialect: &dyn Dialect) -> DatabaseResult<Self>;
}

pub fn get_i64(row: &AnyRow, index: usize, entity: &'static str) -> DatabaseResult<i64> {
    row.try_get::<i64, _>(index)
        .map_err(|e| DatabaseError::scan(entity, format!("column {}: {}", index, e)))
}

/// Stands in for NULL in nullable timestamp columns
pub const NULL_TIMESTAMP: i64 = -1;

/// Select expression for a nullable timestamp column
pub fn nullable_timestamp(column: &str) -> String {
    format!("COALESCE({}, {})", column, NULL_TIMESTAMP)
}

/// Reads a column selected through [`nullable_timestamp`]
pub fn get_opt_i64(
    row: &AnyRow,
    index: usize,
    entity: &'static str,
) -> DatabaseResult<Option<i64>> {
    let value = get_i64(row, index, entity)?;
    Ok((value != NULL_TIMESTAMP).then_some(value))
}

/// Reads a boolean stored either natively or as an integer
pub fn get_flag(row: &AnyRow, index: usize, entity: &'static str) -> DatabaseResult<bool> {
    match row.try_get::<bool, _>(index) {
        Ok(value) => Ok(value),
        Err(_) => get_i64(row, index, entity).map(|value| value != 0),
    }
}

/// Reads text, falling back to UTF-8 bytes
pub fn get_text(row: &AnyRow, index: usize, entity: &'static str) -> DatabaseResult<String> {
    match row.try_get::<String, _>(index) {
        Ok(value) => Ok(value),
        Err(_) => {
            let bytes = get_bytes(row, index, entity)?;
            String::from_utf8(bytes)
                .map_err(|e| DatabaseError::scan(entity, format!("column {}: {}", index, e)))
        }
    }
}

pub fn get_bytes(row: &AnyRow, index: usize, entity: &'static str) -> DatabaseResult<Vec<u8>> {
    row.try_get::<Vec<u8>, _>(index)
        .map_err(|e| DatabaseError::scan(entity, format!("column {}: {}", index, e)))
}

/// Splits a joined list field. An empty string is an empty list.
pub fn split_list(raw: &str, separator: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(separator).map(str::to_string).collect()
}

pub fn join_list(values: &[String], separator: &str) -> String {
    values.join(separator)
}

/// Runs a query expected to return exactly one row
///
/// Zero rows is [`DatabaseError::NotFound`].
pub async fn fetch_one<T: FromAnyRow>(
    pool: &AnyPool,
    dialect: &dyn Dialect,
    query: &BuiltQuery,
) -> DatabaseResult<T> {
    let row = query
        .query()
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::query(format!("fetching {}", T::ENTITY), e))?;

    T::from_row(&row, dialect)
}

/// Runs a query and scans every row until the stream is exhausted
pub async fn fetch_all<T: FromAnyRow>(
    pool: &AnyPool,
    dialect: &dyn Dialect,
    query: &BuiltQuery,
) -> DatabaseResult<Vec<T>> {
    let mut rows = query.query().fetch(pool);
    let mut results = Vec::new();

    while let Some(row) = rows
        .try_next()
        .await
        .map_err(|e| DatabaseError::query(format!("iterating {} rows", T::ENTITY), e))?
    {
        results.push(T::from_row(&row, dialect)?);
    }

    Ok(results)
}

/// Runs a `COUNT` query
pub async fn fetch_count(pool: &AnyPool, query: &BuiltQuery, entity: &'static str) -> DatabaseResult<u64> {
    let row = query
        .query()
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::query(format!("counting {} rows", entity), e))?;

    let count = get_i64(&row, 0, entity)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Runs a `SELECT EXISTS` query
pub async fn fetch_exists(pool: &AnyPool, query: &BuiltQuery, entity: &'static str) -> DatabaseResult<bool> {
    let row = query
        .query()
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::query(format!("checking {} existence", entity), e))?;

    get_flag(&row, 0, entity)
}
