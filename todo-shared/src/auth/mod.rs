/// Authentication primitives used by the data layer
///
/// The data manager only needs one thing from authentication: hashing the
/// seed user's password during migration. That dependency is expressed as
/// the [`Authenticator`] trait so the HTTP layer can supply its own.
///
/// # Modules
///
/// - [`password`]: Argon2id hashing, verification and the default authenticator
///
/// # Example
///
/// ```
/// use todo_shared::auth::{Authenticator, password::Argon2Authenticator};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let authenticator = Argon2Authenticator::default();
/// let hash = authenticator.hash_password("hunter2").await?;
/// assert!(hash.starts_with("$argon2id$"));
/// # Ok(())
/// # }
/// ```

pub mod password;

use async_trait::async_trait;
pub use password::PasswordError;

/// Hashes plaintext passwords for storage
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns a PHC-format hash of `password`
    async fn hash_password(&self, password: &str) -> Result<String, PasswordError>;
}
