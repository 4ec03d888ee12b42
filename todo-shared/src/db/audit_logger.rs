/// Audit log writes
///
/// [`AuditLogger::record_event`] is the path used after every mutation and
/// for the non-CRUD `log_*` events. It never fails the caller: a failed write
/// is logged with its event type and dropped. [`AuditLogger::create`] is the
/// propagating variant behind `create_audit_log_entry`.

use crate::db::dialect::Dialect;
use crate::db::querier::insert_row;
use crate::db::query_builder::{InsertBuilder, Value};
use crate::error::DatabaseResult;
use crate::models::{AuditLogEntry, AuditLogEntryCreationInput};
use sqlx::AnyPool;
use std::sync::Arc;
use tracing::{debug, error};

pub const AUDIT_LOG_TABLE: &str = "audit_log";

const ENTITY: &str = "audit log entry";

#[derive(Debug, Clone)]
pub struct AuditLogger {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
}

impl AuditLogger {
    pub fn new(pool: AnyPool, dialect: Arc<dyn Dialect>) -> Self {
        Self { pool, dialect }
    }

    /// Appends an entry and returns it with its ID and timestamp
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Serialization` if the context cannot be
    /// encoded, or the driver error if the insert fails
    pub async fn create(&self, input: AuditLogEntryCreationInput) -> DatabaseResult<AuditLogEntry> {
        let context = serde_json::to_string(&input.context)?;

        let builder = InsertBuilder::new(AUDIT_LOG_TABLE)
            .value("event_type", Value::arg(input.event_type.as_str()))
            .value("context", Value::Json(context));

        let inserted = insert_row(
            &self.pool,
            self.dialect.as_ref(),
            builder,
            &["created_on"],
            ENTITY,
        )
        .await?;

        debug!(
            event_type = %input.event_type,
            audit_log_entry_id = inserted.id,
            "Recorded audit event"
        );

        Ok(AuditLogEntry {
            id: inserted.id,
            event_type: input.event_type,
            context: input.context,
            created_on: inserted.created_on,
        })
    }

    /// Best-effort append
    ///
    /// Returns the stored entry, or `None` after logging the failure.
    pub async fn record_event(&self, input: AuditLogEntryCreationInput) -> Option<AuditLogEntry> {
        let event_type = input.event_type.clone();

        match self.create(input).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                error!(event_type = %event_type, error = %e, "Writing audit log entry");
                None
            }
        }
    }
}
