/// Webhook model
///
/// A webhook subscribes an HTTP endpoint to events for a set of data types
/// and topics. The three list fields are persisted as comma-joined strings,
/// so their elements must be non-empty and comma-free. An empty list is
/// stored as `""` and read back as an empty list.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE webhooks (
///     id BIGSERIAL NOT NULL PRIMARY KEY,
///     name TEXT NOT NULL,
///     content_type TEXT NOT NULL,
///     url TEXT NOT NULL,
///     method TEXT NOT NULL,
///     events TEXT NOT NULL DEFAULT '',
///     data_types TEXT NOT NULL DEFAULT '',
///     topics TEXT NOT NULL DEFAULT '',
///     created_on BIGINT NOT NULL,
///     last_updated_on BIGINT DEFAULT NULL,
///     archived_on BIGINT DEFAULT NULL,
///     belongs_to_user BIGINT NOT NULL REFERENCES users(id)
/// );
/// ```

use super::{track_change, validate_list_elements, FieldChangeSummary, Pagination};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub name: String,
    pub content_type: String,
    pub url: String,
    pub method: String,
    pub events: Vec<String>,
    pub data_types: Vec<String>,
    pub topics: Vec<String>,
    pub created_on: i64,
    pub last_updated_on: Option<i64>,
    pub archived_on: Option<i64>,
    pub belongs_to_user: i64,
}

/// Input for creating a webhook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WebhookCreationInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "Content type is required"))]
    pub content_type: String,

    #[validate(url(message = "Invalid webhook URL"))]
    pub url: String,

    #[validate(length(min = 1, max = 16, message = "Method must be 1-16 characters"))]
    pub method: String,

    #[serde(default)]
    #[validate(custom(function = "validate_list_elements"))]
    pub events: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_list_elements"))]
    pub data_types: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_list_elements"))]
    pub topics: Vec<String>,

    #[serde(skip)]
    pub belongs_to_user: i64,
}

/// Input for updating a webhook. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WebhookUpdateInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    pub content_type: Option<String>,

    #[validate(url(message = "Invalid webhook URL"))]
    pub url: Option<String>,

    pub method: Option<String>,

    #[validate(custom(function = "validate_list_elements"))]
    pub events: Option<Vec<String>>,

    #[validate(custom(function = "validate_list_elements"))]
    pub data_types: Option<Vec<String>>,

    #[validate(custom(function = "validate_list_elements"))]
    pub topics: Option<Vec<String>>,
}

impl Webhook {
    /// Applies an update input and returns the summary of changed fields
    pub fn update(&mut self, input: &WebhookUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = Vec::new();
        track_change(&mut changes, "name", &mut self.name, input.name.as_ref());
        track_change(
            &mut changes,
            "content_type",
            &mut self.content_type,
            input.content_type.as_ref(),
        );
        track_change(&mut changes, "url", &mut self.url, input.url.as_ref());
        track_change(&mut changes, "method", &mut self.method, input.method.as_ref());
        track_change(&mut changes, "events", &mut self.events, input.events.as_ref());
        track_change(
            &mut changes,
            "data_types",
            &mut self.data_types,
            input.data_types.as_ref(),
        );
        track_change(&mut changes, "topics", &mut self.topics, input.topics.as_ref());
        changes
    }
}

/// A page of webhooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookList {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub webhooks: Vec<Webhook>,
}
