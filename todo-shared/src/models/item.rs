/// Item model
///
/// Items are the core user-owned record. Ownership is enforced by every
/// non-administrative query through `belongs_to_user`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE items (
///     id BIGSERIAL NOT NULL PRIMARY KEY,
///     name TEXT NOT NULL,
///     details TEXT NOT NULL DEFAULT '',
///     created_on BIGINT NOT NULL,
///     last_updated_on BIGINT DEFAULT NULL,
///     archived_on BIGINT DEFAULT NULL,
///     belongs_to_user BIGINT NOT NULL REFERENCES users(id)
/// );
/// ```

use super::{track_change, FieldChangeSummary, Pagination};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub details: String,
    pub created_on: i64,
    pub last_updated_on: Option<i64>,
    pub archived_on: Option<i64>,
    pub belongs_to_user: i64,
}

/// Input for creating an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ItemCreationInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 4096, message = "Details must be at most 4096 characters"))]
    #[serde(default)]
    pub details: String,

    /// Owner, set from the session rather than the request body
    #[serde(skip)]
    pub belongs_to_user: i64,
}

/// Input for updating an item. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ItemUpdateInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 4096, message = "Details must be at most 4096 characters"))]
    pub details: Option<String>,
}

impl Item {
    /// Applies an update input and returns the summary of changed fields
    ///
    /// The summary is what the caller hands to `update_item` for the audit
    /// trail; unchanged fields are not reported.
    ///
    /// # Example
    ///
    /// ```
    /// use todo_shared::models::{Item, ItemUpdateInput};
    ///
    /// let mut item = Item {
    ///     id: 1,
    ///     name: "laundry".to_string(),
    ///     details: String::new(),
    ///     created_on: 0,
    ///     last_updated_on: None,
    ///     archived_on: None,
    ///     belongs_to_user: 1,
    /// };
    ///
    /// let changes = item.update(&ItemUpdateInput {
    ///     name: Some("dishes".to_string()),
    ///     details: Some(String::new()),
    /// });
    ///
    /// assert_eq!(changes.len(), 1);
    /// assert_eq!(item.name, "dishes");
    /// ```
    pub fn update(&mut self, input: &ItemUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = Vec::new();
        track_change(&mut changes, "name", &mut self.name, input.name.as_ref());
        track_change(&mut changes, "details", &mut self.details, input.details.as_ref());
        changes
    }
}

/// A page of items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemList {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub items: Vec<Item>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example_item() -> Item {
        Item {
            id: 12,
            name: "groceries".to_string(),
            details: "milk".to_string(),
            created_on: 1_600_000_000,
            last_updated_on: None,
            archived_on: None,
            belongs_to_user: 3,
        }
    }

    #[test]
    fn test_update_reports_changed_fields_only() {
        let mut item = example_item();
        let changes = item.update(&ItemUpdateInput {
            name: Some("groceries".to_string()),
            details: Some("eggs".to_string()),
        });

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_name, "details");
        assert_eq!(changes[0].old_value, json!("milk"));
        assert_eq!(changes[0].new_value, json!("eggs"));
        assert_eq!(item.details, "eggs");
    }

    #[test]
    fn test_empty_update_is_noop() {
        let mut item = example_item();
        assert!(item.update(&ItemUpdateInput::default()).is_empty());
        assert_eq!(item, example_item());
    }

    #[test]
    fn test_creation_input_validation() {
        let valid = ItemCreationInput {
            name: "thing".to_string(),
            details: String::new(),
            belongs_to_user: 1,
        };
        assert!(valid.validate().is_ok());

        let invalid = ItemCreationInput {
            name: String::new(),
            ..valid
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_list_flattens_pagination() {
        let list = ItemList {
            pagination: Pagination {
                page: 1,
                limit: 20,
                total_count: 1,
            },
            items: vec![example_item()],
        };
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["page"], json!(1));
        assert_eq!(value["items"][0]["name"], json!("groceries"));
    }
}
