/// Data model for the todo service
///
/// Every mutable entity carries a numeric ID, a unix-seconds `created_on`, an
/// optional `last_updated_on` and an optional `archived_on`. Nothing is ever
/// physically deleted; archival is terminal.
///
/// # Models
///
/// - `item`: the user-owned todo item
/// - `webhook`: outbound notification subscriptions
/// - `oauth2_client`: registered OAuth2 clients
/// - `user`: accounts, account status and admin permissions
/// - `audit_log_entry`: append-only audit trail
/// - `query_filter`: pagination and range filtering for list queries

pub mod audit_log_entry;
pub mod item;
pub mod oauth2_client;
pub mod query_filter;
pub mod user;
pub mod webhook;

pub use audit_log_entry::{
    AuditLogContext, AuditLogEntry, AuditLogEntryCreationInput, AuditLogEntryList,
    FieldChangeSummary,
};
pub use item::{Item, ItemCreationInput, ItemList, ItemUpdateInput};
pub use oauth2_client::{OAuth2Client, OAuth2ClientCreationInput, OAuth2ClientList};
pub use query_filter::{Pagination, QueryFilter};
pub use user::{AccountStatus, AdminPermissions, User, UserCreationInput, UserList};
pub use webhook::{Webhook, WebhookCreationInput, WebhookList, WebhookUpdateInput};

use validator::ValidationError;

/// Separator list fields are joined with in storage
pub const LIST_SEPARATOR: &str = ",";

/// Rejects list elements that would not survive being joined and split
#[allow(clippy::ptr_arg)]
pub(crate) fn validate_list_elements(values: &Vec<String>) -> Result<(), ValidationError> {
    if values
        .iter()
        .any(|value| value.is_empty() || value.contains(LIST_SEPARATOR))
    {
        return Err(ValidationError::new("list_element")
            .with_message("List elements must be non-empty and contain no commas".into()));
    }
    Ok(())
}

/// Records a field change when `new` differs from `current`, then applies it
pub(crate) fn track_change<T>(
    changes: &mut Vec<FieldChangeSummary>,
    field_name: &str,
    current: &mut T,
    new: Option<&T>,
) where
    T: Clone + PartialEq + serde::Serialize,
{
    let Some(new) = new else {
        return;
    };
    if current == new {
        return;
    }
    changes.push(FieldChangeSummary {
        field_name: field_name.to_string(),
        old_value: serde_json::to_value(&*current).unwrap_or_default(),
        new_value: serde_json::to_value(new).unwrap_or_default(),
    });
    *current = new.clone();
}
