/// OAuth2 client model
///
/// `client_id` is unique across all clients, archived ones included.
/// `client_secret` is never serialized.

use super::{validate_list_elements, Pagination};
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::Validate;

const CLIENT_ID_BYTES: usize = 16;
const CLIENT_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Client {
    pub id: i64,
    pub name: String,
    pub client_id: String,

    #[serde(skip_serializing, default)]
    pub client_secret: String,

    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub implicit_allowed: bool,
    pub created_on: i64,
    pub last_updated_on: Option<i64>,
    pub archived_on: Option<i64>,
    pub belongs_to_user: i64,
}

impl OAuth2Client {
    /// Returns true if the client was granted `scope` (or the `*` wildcard)
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == "*")
    }
}

/// Input for registering an OAuth2 client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OAuth2ClientCreationInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 64, message = "Client ID must be 1-64 characters"))]
    pub client_id: String,

    #[validate(length(min = 1, max = 128, message = "Client secret must be 1-128 characters"))]
    pub client_secret: String,

    #[serde(default)]
    pub redirect_uri: String,

    #[serde(default)]
    #[validate(custom(function = "validate_list_elements"))]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub implicit_allowed: bool,

    #[serde(skip)]
    pub belongs_to_user: i64,
}

impl OAuth2ClientCreationInput {
    /// Builds an input with a freshly generated client ID and secret
    pub fn with_generated_credentials(
        name: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
        belongs_to_user: i64,
    ) -> Self {
        Self {
            name: name.into(),
            client_id: generate_token(CLIENT_ID_BYTES),
            client_secret: generate_token(CLIENT_SECRET_BYTES),
            redirect_uri: redirect_uri.into(),
            scopes,
            implicit_allowed: false,
            belongs_to_user,
        }
    }
}

/// Hex-encoded random token of `len` bytes
fn generate_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// A page of OAuth2 clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2ClientList {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub clients: Vec<OAuth2Client>,
}
