/// Audit log entry model
///
/// Entries are append-only: created and read, never updated or archived.
/// The `context` object correlates an entry with the entities it concerns
/// through well-known keys (see [`crate::audit`]).

use super::Pagination;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Structured context attached to an audit entry
pub type AuditLogContext = BTreeMap<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub event_type: String,
    pub context: AuditLogContext,
    pub created_on: i64,
}

impl AuditLogEntry {
    /// Reads an integer ID stored under `key` in the context
    pub fn context_id(&self, key: &str) -> Option<i64> {
        self.context.get(key).and_then(JsonValue::as_i64)
    }
}

/// Input for appending an audit entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntryCreationInput {
    pub event_type: String,
    pub context: AuditLogContext,
}

/// One changed field, as reported by the caller of an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChangeSummary {
    pub field_name: String,
    pub old_value: JsonValue,
    pub new_value: JsonValue,
}

/// A page of audit log entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntryList {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub entries: Vec<AuditLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_id() {
        let mut context = AuditLogContext::new();
        context.insert("item_id".to_string(), json!(42));
        context.insert("performed_by".to_string(), json!("not a number"));

        let entry = AuditLogEntry {
            id: 1,
            event_type: "item_created".to_string(),
            context,
            created_on: 0,
        };

        assert_eq!(entry.context_id("item_id"), Some(42));
        assert_eq!(entry.context_id("performed_by"), None);
        assert_eq!(entry.context_id("missing"), None);
    }
}
