/// User model
///
/// Users move through `created -> unverified -> good` as they register and
/// verify their two-factor secret, and can be moved to `banned` by an admin
/// at any point. Standard lookups only return users whose two-factor secret
/// has been verified.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL NOT NULL PRIMARY KEY,
///     username TEXT NOT NULL UNIQUE,
///     hashed_password TEXT NOT NULL,
///     salt BYTEA NOT NULL,
///     requires_password_change BOOLEAN NOT NULL DEFAULT FALSE,
///     password_last_changed_on BIGINT DEFAULT NULL,
///     two_factor_secret TEXT NOT NULL,
///     two_factor_secret_verified_on BIGINT DEFAULT NULL,
///     is_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     admin_permissions BIGINT NOT NULL DEFAULT 0,
///     account_status TEXT NOT NULL DEFAULT 'created',
///     account_status_explanation TEXT NOT NULL DEFAULT '',
///     created_on BIGINT NOT NULL,
///     last_updated_on BIGINT DEFAULT NULL,
///     archived_on BIGINT DEFAULT NULL
/// );
/// ```

use super::Pagination;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Account standing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Row exists but registration has not finished
    #[default]
    Created,

    /// Registered, two-factor secret not yet verified
    Unverified,

    /// Verified and in good standing
    Good,

    /// Banned by an administrator
    Banned,

    /// Account closed
    Terminated,
}

impl AccountStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Created => "created",
            AccountStatus::Unverified => "unverified",
            AccountStatus::Good => "good",
            AccountStatus::Banned => "banned",
            AccountStatus::Terminated => "terminated",
        }
    }

    /// Parses status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(AccountStatus::Created),
            "unverified" => Some(AccountStatus::Unverified),
            "good" => Some(AccountStatus::Good),
            "banned" => Some(AccountStatus::Banned),
            "terminated" => Some(AccountStatus::Terminated),
            _ => None,
        }
    }
}

/// Service-admin permission bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminPermissions(i64);

impl AdminPermissions {
    pub const CYCLE_COOKIE_SECRET: AdminPermissions = AdminPermissions(1);
    pub const BAN_USER: AdminPermissions = AdminPermissions(1 << 1);
    pub const TERMINATE_ACCOUNTS: AdminPermissions = AdminPermissions(1 << 2);

    pub const fn none() -> Self {
        AdminPermissions(0)
    }

    /// Every defined permission
    pub const fn all() -> Self {
        AdminPermissions(
            Self::CYCLE_COOKIE_SECRET.0 | Self::BAN_USER.0 | Self::TERMINATE_ACCOUNTS.0,
        )
    }

    pub const fn from_bits(bits: i64) -> Self {
        AdminPermissions(bits)
    }

    pub const fn bits(&self) -> i64 {
        self.0
    }

    pub const fn contains(&self, other: AdminPermissions) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: AdminPermissions) -> Self {
        AdminPermissions(self.0 | other.0)
    }

    pub fn can_cycle_cookie_secret(&self) -> bool {
        self.contains(Self::CYCLE_COOKIE_SECRET)
    }

    pub fn can_ban_users(&self) -> bool {
        self.contains(Self::BAN_USER)
    }

    pub fn can_terminate_accounts(&self) -> bool {
        self.contains(Self::TERMINATE_ACCOUNTS)
    }
}

/// User account
///
/// Secret material is never serialized, so it never ends up in API
/// responses or audit contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub hashed_password: String,

    #[serde(skip_serializing, default)]
    pub salt: Vec<u8>,

    pub requires_password_change: bool,
    pub password_last_changed_on: Option<i64>,

    #[serde(skip_serializing, default)]
    pub two_factor_secret: String,

    /// Set once the user proves possession of the two-factor secret
    pub two_factor_secret_verified_on: Option<i64>,

    pub is_admin: bool,
    pub admin_permissions: AdminPermissions,
    pub account_status: AccountStatus,
    pub account_status_explanation: String,
    pub created_on: i64,
    pub last_updated_on: Option<i64>,
    pub archived_on: Option<i64>,
}

impl User {
    pub fn is_banned(&self) -> bool {
        self.account_status == AccountStatus::Banned
    }

    pub fn two_factor_verified(&self) -> bool {
        self.two_factor_secret_verified_on.is_some()
    }
}

/// Input for inserting a user
///
/// The password is already hashed; hashing belongs to the authenticator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserCreationInput {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,

    #[validate(length(min = 1, message = "Hashed password is required"))]
    #[serde(skip_serializing)]
    pub hashed_password: String,

    #[serde(skip_serializing, default)]
    pub salt: Vec<u8>,

    #[validate(length(min = 1, message = "Two factor secret is required"))]
    #[serde(skip_serializing)]
    pub two_factor_secret: String,
}

/// A page of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub users: Vec<User>,
}
