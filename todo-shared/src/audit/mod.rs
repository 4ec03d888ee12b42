/// Audit event catalog
///
/// Every state change to an item, webhook, OAuth2 client or user, plus the
/// authentication events the HTTP layer reports, is described by one
/// [`AuditEventType`]. The `build_*` functions produce the creation input for
/// each event with its context keys filled in; the data manager persists it.

use crate::models::{
    AuditLogContext, AuditLogEntryCreationInput, FieldChangeSummary, Item, OAuth2Client, User,
    Webhook,
};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// Context key for the acting user
pub const PERFORMED_BY_KEY: &str = "performed_by";
/// Context key for the affected user
pub const USER_ASSIGNMENT_KEY: &str = "user_id";
pub const ITEM_ASSIGNMENT_KEY: &str = "item_id";
pub const WEBHOOK_ASSIGNMENT_KEY: &str = "webhook_id";
pub const OAUTH2_CLIENT_ASSIGNMENT_KEY: &str = "oauth2_client_id";
/// Context key for the serialized entity on creation events
pub const CREATION_ASSIGNMENT_KEY: &str = "created";
/// Context key for the change summary on update events
pub const CHANGES_ASSIGNMENT_KEY: &str = "changes";
pub const BAN_REASON_KEY: &str = "reason";

/// Audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    ItemCreated,
    ItemUpdated,
    ItemArchived,
    WebhookCreated,
    WebhookUpdated,
    WebhookArchived,
    OAuth2ClientCreated,
    OAuth2ClientUpdated,
    OAuth2ClientArchived,
    UserCreated,
    UserUpdated,
    UserVerifiedTwoFactorSecret,
    UserUpdatedTwoFactorSecret,
    UserUpdatedPassword,
    UserBanned,
    UserArchived,
    CycleCookieSecret,
    SuccessfulLogin,
    BannedUserLoginAttempt,
    UnsuccessfulLoginBadPassword,
    UnsuccessfulLoginBad2FaToken,
    Logout,
}

impl AuditEventType {
    /// Converts event type to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ItemCreated => "item_created",
            AuditEventType::ItemUpdated => "item_updated",
            AuditEventType::ItemArchived => "item_archived",
            AuditEventType::WebhookCreated => "webhook_created",
            AuditEventType::WebhookUpdated => "webhook_updated",
            AuditEventType::WebhookArchived => "webhook_archived",
            AuditEventType::OAuth2ClientCreated => "oauth2_client_created",
            AuditEventType::OAuth2ClientUpdated => "oauth2_client_updated",
            AuditEventType::OAuth2ClientArchived => "oauth2_client_archived",
            AuditEventType::UserCreated => "user_created",
            AuditEventType::UserUpdated => "user_updated",
            AuditEventType::UserVerifiedTwoFactorSecret => "user_verified_two_factor_secret",
            AuditEventType::UserUpdatedTwoFactorSecret => "user_updated_two_factor_secret",
            AuditEventType::UserUpdatedPassword => "user_updated_password",
            AuditEventType::UserBanned => "user_banned",
            AuditEventType::UserArchived => "user_archived",
            AuditEventType::CycleCookieSecret => "cycle_cookie_secret",
            AuditEventType::SuccessfulLogin => "user_logged_in",
            AuditEventType::BannedUserLoginAttempt => "banned_user_login_attempt",
            AuditEventType::UnsuccessfulLoginBadPassword => "unsuccessful_login_bad_password",
            AuditEventType::UnsuccessfulLoginBad2FaToken => "unsuccessful_login_bad_2fa_token",
            AuditEventType::Logout => "user_logged_out",
        }
    }

    /// Parses event type from string
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.as_str() == s)
    }

    pub const ALL: [AuditEventType; 22] = [
        AuditEventType::ItemCreated,
        AuditEventType::ItemUpdated,
        AuditEventType::ItemArchived,
        AuditEventType::WebhookCreated,
        AuditEventType::WebhookUpdated,
        AuditEventType::WebhookArchived,
        AuditEventType::OAuth2ClientCreated,
        AuditEventType::OAuth2ClientUpdated,
        AuditEventType::OAuth2ClientArchived,
        AuditEventType::UserCreated,
        AuditEventType::UserUpdated,
        AuditEventType::UserVerifiedTwoFactorSecret,
        AuditEventType::UserUpdatedTwoFactorSecret,
        AuditEventType::UserUpdatedPassword,
        AuditEventType::UserBanned,
        AuditEventType::UserArchived,
        AuditEventType::CycleCookieSecret,
        AuditEventType::SuccessfulLogin,
        AuditEventType::BannedUserLoginAttempt,
        AuditEventType::UnsuccessfulLoginBadPassword,
        AuditEventType::UnsuccessfulLoginBad2FaToken,
        AuditEventType::Logout,
    ];
}

fn entry<const N: usize>(
    event_type: AuditEventType,
    pairs: [(&str, JsonValue); N],
) -> AuditLogEntryCreationInput {
    let context: AuditLogContext = pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    AuditLogEntryCreationInput {
        event_type: event_type.as_str().to_string(),
        context,
    }
}

fn to_json<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or_default()
}

pub fn build_item_created_event_entry(item: &Item) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::ItemCreated,
        [
            (PERFORMED_BY_KEY, json!(item.belongs_to_user)),
            (ITEM_ASSIGNMENT_KEY, json!(item.id)),
            (CREATION_ASSIGNMENT_KEY, to_json(item)),
        ],
    )
}

pub fn build_item_updated_event_entry(
    user_id: i64,
    item_id: i64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::ItemUpdated,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (ITEM_ASSIGNMENT_KEY, json!(item_id)),
            (CHANGES_ASSIGNMENT_KEY, to_json(&changes)),
        ],
    )
}

pub fn build_item_archived_event_entry(user_id: i64, item_id: i64) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::ItemArchived,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (ITEM_ASSIGNMENT_KEY, json!(item_id)),
        ],
    )
}

pub fn build_webhook_created_event_entry(webhook: &Webhook) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::WebhookCreated,
        [
            (PERFORMED_BY_KEY, json!(webhook.belongs_to_user)),
            (WEBHOOK_ASSIGNMENT_KEY, json!(webhook.id)),
            (CREATION_ASSIGNMENT_KEY, to_json(webhook)),
        ],
    )
}

pub fn build_webhook_updated_event_entry(
    user_id: i64,
    webhook_id: i64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::WebhookUpdated,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (WEBHOOK_ASSIGNMENT_KEY, json!(webhook_id)),
            (CHANGES_ASSIGNMENT_KEY, to_json(&changes)),
        ],
    )
}

pub fn build_webhook_archived_event_entry(
    user_id: i64,
    webhook_id: i64,
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::WebhookArchived,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (WEBHOOK_ASSIGNMENT_KEY, json!(webhook_id)),
        ],
    )
}

pub fn build_oauth2_client_created_event_entry(
    client: &OAuth2Client,
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::OAuth2ClientCreated,
        [
            (PERFORMED_BY_KEY, json!(client.belongs_to_user)),
            (OAUTH2_CLIENT_ASSIGNMENT_KEY, json!(client.id)),
            (CREATION_ASSIGNMENT_KEY, to_json(client)),
        ],
    )
}

pub fn build_oauth2_client_updated_event_entry(
    user_id: i64,
    client_id: i64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::OAuth2ClientUpdated,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (OAUTH2_CLIENT_ASSIGNMENT_KEY, json!(client_id)),
            (CHANGES_ASSIGNMENT_KEY, to_json(&changes)),
        ],
    )
}

pub fn build_oauth2_client_archived_event_entry(
    user_id: i64,
    client_id: i64,
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::OAuth2ClientArchived,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (OAUTH2_CLIENT_ASSIGNMENT_KEY, json!(client_id)),
        ],
    )
}

pub fn build_user_created_event_entry(user: &User) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::UserCreated,
        [
            (PERFORMED_BY_KEY, json!(user.id)),
            (USER_ASSIGNMENT_KEY, json!(user.id)),
            (CREATION_ASSIGNMENT_KEY, to_json(user)),
        ],
    )
}

pub fn build_user_updated_event_entry(
    user_id: i64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::UserUpdated,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (USER_ASSIGNMENT_KEY, json!(user_id)),
            (CHANGES_ASSIGNMENT_KEY, to_json(&changes)),
        ],
    )
}

pub fn build_user_verified_two_factor_secret_event_entry(
    user_id: i64,
) -> AuditLogEntryCreationInput {
    user_self_event(AuditEventType::UserVerifiedTwoFactorSecret, user_id)
}

pub fn build_user_updated_two_factor_secret_event_entry(
    user_id: i64,
) -> AuditLogEntryCreationInput {
    user_self_event(AuditEventType::UserUpdatedTwoFactorSecret, user_id)
}

pub fn build_user_updated_password_event_entry(user_id: i64) -> AuditLogEntryCreationInput {
    user_self_event(AuditEventType::UserUpdatedPassword, user_id)
}

pub fn build_user_archived_event_entry(user_id: i64) -> AuditLogEntryCreationInput {
    user_self_event(AuditEventType::UserArchived, user_id)
}

pub fn build_user_banned_event_entry(
    banned_user_id: i64,
    banned_by: i64,
    reason: &str,
) -> AuditLogEntryCreationInput {
    entry(
        AuditEventType::UserBanned,
        [
            (PERFORMED_BY_KEY, json!(banned_by)),
            (USER_ASSIGNMENT_KEY, json!(banned_user_id)),
            (BAN_REASON_KEY, json!(reason)),
        ],
    )
}

pub fn build_cycle_cookie_secret_event(user_id: i64) -> AuditLogEntryCreationInput {
    actor_event(AuditEventType::CycleCookieSecret, user_id)
}

pub fn build_successful_login_event(user_id: i64) -> AuditLogEntryCreationInput {
    actor_event(AuditEventType::SuccessfulLogin, user_id)
}

pub fn build_banned_user_login_attempt_event(user_id: i64) -> AuditLogEntryCreationInput {
    actor_event(AuditEventType::BannedUserLoginAttempt, user_id)
}

pub fn build_unsuccessful_login_bad_password_event(user_id: i64) -> AuditLogEntryCreationInput {
    actor_event(AuditEventType::UnsuccessfulLoginBadPassword, user_id)
}

pub fn build_unsuccessful_login_bad_2fa_token_event(user_id: i64) -> AuditLogEntryCreationInput {
    actor_event(AuditEventType::UnsuccessfulLoginBad2FaToken, user_id)
}

pub fn build_logout_event(user_id: i64) -> AuditLogEntryCreationInput {
    actor_event(AuditEventType::Logout, user_id)
}

fn user_self_event(event_type: AuditEventType, user_id: i64) -> AuditLogEntryCreationInput {
    entry(
        event_type,
        [
            (PERFORMED_BY_KEY, json!(user_id)),
            (USER_ASSIGNMENT_KEY, json!(user_id)),
        ],
    )
}

fn actor_event(event_type: AuditEventType, user_id: i64) -> AuditLogEntryCreationInput {
    entry(event_type, [(PERFORMED_BY_KEY, json!(user_id))])
}
