/// Dialect-aware SQL assembly
///
/// Builders are plain values describing a SELECT, INSERT or UPDATE over a
/// fixed column set. Calling `build` with a [`Dialect`] renders the final SQL
/// string and the positional arguments in bind order, using the dialect's
/// placeholder style and "current time" expression.
///
/// Assembly failures are programming defects, not bad input. Report them with
/// [`log_query_building_error`], which writes to a dedicated tracing target so
/// they can be alerted on separately from ordinary query failures.
///
/// # Example
///
/// ```
/// use todo_shared::db::dialect::{Dialect, Postgres};
/// use todo_shared::db::query_builder::{Predicate, SelectBuilder};
///
/// let built = SelectBuilder::new("items", ["items.id", "items.name"])
///     .filter(Predicate::eq("items.belongs_to_user", 7))
///     .filter(Predicate::is_null("items.archived_on"))
///     .build(&Postgres)
///     .unwrap();
///
/// assert_eq!(
///     built.sql,
///     "SELECT items.id, items.name FROM items WHERE items.belongs_to_user = $1 AND items.archived_on IS NULL"
/// );
/// ```

use crate::db::dialect::Dialect;
use serde::{Deserialize, Serialize};
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

/// Tracing target for query assembly defects
pub const QUERY_BUILDING_TARGET: &str = "todo_shared::query_building";

/// A positional argument bound into a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Int(i64),
    OptInt(Option<i64>),
    Text(String),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        QueryArg::Int(value)
    }
}

impl From<Option<i64>> for QueryArg {
    fn from(value: Option<i64>) -> Self {
        QueryArg::OptInt(value)
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        QueryArg::Text(value)
    }
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        QueryArg::Text(value.to_string())
    }
}

impl From<bool> for QueryArg {
    fn from(value: bool) -> Self {
        QueryArg::Bool(value)
    }
}

impl From<Vec<u8>> for QueryArg {
    fn from(value: Vec<u8>) -> Self {
        QueryArg::Bytes(value)
    }
}

/// Right-hand side of an INSERT value or UPDATE assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A bound argument
    Arg(QueryArg),
    /// The dialect's current unix time expression
    CurrentTime,
    /// Serialized JSON destined for a JSON column
    Json(String),
}

impl Value {
    /// Shorthand for [`Value::Arg`]
    pub fn arg(value: impl Into<QueryArg>) -> Self {
        Value::Arg(value.into())
    }
}

/// Sort direction for the primary key ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A single WHERE clause element. Predicates in a builder are AND-ed together.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, QueryArg),
    Gt(String, QueryArg),
    Lt(String, QueryArg),
    IsNull(String),
    IsNotNull(String),
    In(String, Vec<QueryArg>),
    /// Case-insensitive prefix match
    StartsWith(String, String),
    /// Equality on one key of a JSON object column
    JsonKeyEquals {
        column: String,
        key: String,
        value: i64,
    },
    /// Parenthesized OR-group
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<QueryArg>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<QueryArg>) -> Self {
        Predicate::Gt(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<QueryArg>) -> Self {
        Predicate::Lt(column.into(), value.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull(column.into())
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryArg>,
    {
        Predicate::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(column: impl Into<String>, prefix: impl Into<String>) -> Self {
        Predicate::StartsWith(column.into(), prefix.into())
    }

    pub fn json_key_equals(column: impl Into<String>, key: impl Into<String>, value: i64) -> Self {
        Predicate::JsonKeyEquals {
            column: column.into(),
            key: key.into(),
            value,
        }
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Predicate::Or(predicates)
    }
}

/// SQL assembly defect
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryBuildError {
    #[error("no table name provided")]
    MissingTable,

    #[error("no columns provided for {table}")]
    NoColumns { table: String },

    #[error("update of {table} has no assignments")]
    NoAssignments { table: String },

    #[error("empty IN list for {column}")]
    EmptyInList { column: String },

    #[error("empty OR group")]
    EmptyOrGroup,
}

/// Reports an assembly defect on the query-building target
pub fn log_query_building_error(err: &QueryBuildError) {
    tracing::error!(
        target: QUERY_BUILDING_TARGET,
        alert = true,
        error = %err,
        "building query"
    );
}

/// Rendered SQL plus positional arguments in bind order
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<QueryArg>,
}

impl BuiltQuery {
    /// Prepares a sqlx query with every argument bound
    pub fn query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for arg in &self.args {
            query = match arg {
                QueryArg::Int(value) => query.bind(*value),
                QueryArg::OptInt(value) => query.bind(*value),
                QueryArg::Text(value) => query.bind(value.as_str()),
                QueryArg::Bool(value) => query.bind(*value),
                QueryArg::Bytes(value) => query.bind(value.as_slice()),
            };
        }
        query
    }
}

/// Accumulates arguments and hands out placeholders in order
struct Binder<'d> {
    dialect: &'d dyn Dialect,
    args: Vec<QueryArg>,
}

impl<'d> Binder<'d> {
    fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            args: Vec::new(),
        }
    }

    fn push(&mut self, arg: QueryArg) -> String {
        self.args.push(arg);
        self.dialect.placeholder(self.args.len())
    }

    fn value(&mut self, value: &Value) -> String {
        match value {
            Value::Arg(arg) => self.push(arg.clone()),
            Value::CurrentTime => self.dialect.current_unix_time().to_string(),
            Value::Json(json) => {
                let placeholder = self.push(QueryArg::Text(json.clone()));
                self.dialect.json_value(&placeholder)
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<String, QueryBuildError> {
        Ok(match predicate {
            Predicate::Eq(column, arg) => format!("{} = {}", column, self.push(arg.clone())),
            Predicate::Gt(column, arg) => format!("{} > {}", column, self.push(arg.clone())),
            Predicate::Lt(column, arg) => format!("{} < {}", column, self.push(arg.clone())),
            Predicate::IsNull(column) => format!("{} IS NULL", column),
            Predicate::IsNotNull(column) => format!("{} IS NOT NULL", column),
            Predicate::In(column, values) => {
                if values.is_empty() {
                    return Err(QueryBuildError::EmptyInList {
                        column: column.clone(),
                    });
                }
                let placeholders: Vec<String> =
                    values.iter().map(|arg| self.push(arg.clone())).collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            Predicate::StartsWith(column, prefix) => {
                let placeholder = self.push(QueryArg::Text(format!("{}%", prefix)));
                format!(
                    "{} {} {}",
                    column,
                    self.dialect.case_insensitive_like(),
                    placeholder
                )
            }
            Predicate::JsonKeyEquals { column, key, value } => {
                let arg = self.dialect.json_key_arg(*value);
                let placeholder = self.push(arg);
                self.dialect.json_key_equals(column, key, &placeholder)
            }
            Predicate::Or(predicates) => {
                if predicates.is_empty() {
                    return Err(QueryBuildError::EmptyOrGroup);
                }
                let mut rendered = Vec::with_capacity(predicates.len());
                for predicate in predicates {
                    rendered.push(self.predicate(predicate)?);
                }
                format!("({})", rendered.join(" OR "))
            }
        })
    }

    fn where_clause(&mut self, predicates: &[Predicate]) -> Result<String, QueryBuildError> {
        if predicates.is_empty() {
            return Ok(String::new());
        }
        let mut rendered = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            rendered.push(self.predicate(predicate)?);
        }
        Ok(format!(" WHERE {}", rendered.join(" AND ")))
    }

    fn finish(self, sql: String) -> BuiltQuery {
        BuiltQuery {
            sql,
            args: self.args,
        }
    }
}

fn require_table(table: &str) -> Result<(), QueryBuildError> {
    if table.trim().is_empty() {
        Err(QueryBuildError::MissingTable)
    } else {
        Ok(())
    }
}

/// SELECT over one table
#[derive(Debug, Clone, PartialEq)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    order_by: Option<(String, SortOrder)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            predicates: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// `SELECT COUNT(<table>.id) FROM <table>`
    pub fn count(table: impl Into<String>) -> Self {
        let table = table.into();
        let column = format!("COUNT({}.id)", table);
        Self::new(table, [column])
    }

    /// Same table and predicates, counting instead of selecting columns
    ///
    /// Ordering and paging are dropped.
    pub fn count_query(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            ..Self::count(self.table.clone())
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(&self, dialect: &dyn Dialect) -> Result<BuiltQuery, QueryBuildError> {
        let mut binder = Binder::new(dialect);
        let sql = self.render(&mut binder)?;
        Ok(binder.finish(sql))
    }

    /// Wraps the select in `SELECT EXISTS (...)`
    pub fn build_exists(&self, dialect: &dyn Dialect) -> Result<BuiltQuery, QueryBuildError> {
        let mut binder = Binder::new(dialect);
        let inner = self.render(&mut binder)?;
        Ok(binder.finish(format!("SELECT EXISTS ({})", inner)))
    }

    fn render(&self, binder: &mut Binder<'_>) -> Result<String, QueryBuildError> {
        require_table(&self.table)?;
        if self.columns.is_empty() {
            return Err(QueryBuildError::NoColumns {
                table: self.table.clone(),
            });
        }

        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        sql.push_str(&binder.where_clause(&self.predicates)?);

        if let Some((column, order)) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", column, order.as_sql()));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(sql)
    }
}

/// INSERT of a single row
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    returning: Vec<String>,
}

impl InsertBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }

    /// Columns to return. Ignored by dialects without `RETURNING`.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self, dialect: &dyn Dialect) -> Result<BuiltQuery, QueryBuildError> {
        require_table(&self.table)?;
        if self.columns.is_empty() {
            return Err(QueryBuildError::NoColumns {
                table: self.table.clone(),
            });
        }

        let mut binder = Binder::new(dialect);
        let values: Vec<String> = self.values.iter().map(|v| binder.value(v)).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            values.join(", ")
        );
        if dialect.supports_returning() && !self.returning.is_empty() {
            sql.push_str(&format!(" RETURNING {}", self.returning.join(", ")));
        }

        Ok(binder.finish(sql))
    }
}

/// UPDATE with AND-ed predicates
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBuilder {
    table: String,
    assignments: Vec<(String, Value)>,
    predicates: Vec<Predicate>,
    returning: Vec<String>,
}

impl UpdateBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            predicates: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.assignments.push((column.into(), value));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Columns to return. Ignored by dialects without `RETURNING`.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self, dialect: &dyn Dialect) -> Result<BuiltQuery, QueryBuildError> {
        require_table(&self.table)?;
        if self.assignments.is_empty() {
            return Err(QueryBuildError::NoAssignments {
                table: self.table.clone(),
            });
        }

        let mut binder = Binder::new(dialect);
        let assignments: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| format!("{} = {}", column, binder.value(value)))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        sql.push_str(&binder.where_clause(&self.predicates)?);
        if dialect.supports_returning() && !self.returning.is_empty() {
            sql.push_str(&format!(" RETURNING {}", self.returning.join(", ")));
        }

        Ok(binder.finish(sql))
    }
}
