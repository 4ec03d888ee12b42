/// Password hashing using Argon2id
///
/// # Security
///
/// - **Algorithm**: Argon2id (hybrid of Argon2i and Argon2d)
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// Hashing is CPU and memory heavy, so [`Argon2Authenticator`] runs it on the
/// blocking thread pool.
///
/// # Example
///
/// ```
/// use todo_shared::auth::password::{hash_password, verify_password, HashingParams};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let params = HashingParams::default();
/// let hash = hash_password("super_secret_password_123", &params)?;
///
/// assert!(verify_password("super_secret_password_123", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use super::Authenticator;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use async_trait::async_trait;
use rand::RngCore;

/// Length of the per-user salt stored alongside the hash
pub const SALT_LENGTH: usize = 16;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Hashes a password using Argon2id
///
/// # Returns
///
/// PHC string format hash (includes algorithm, parameters, salt, and hash)
///
/// ```text
/// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
/// ```
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the parameters are invalid or
/// hashing fails
pub fn hash_password(password: &str, params: &HashingParams) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let argon_params = ParamsBuilder::new()
        .m_cost(params.memory_kib)
        .t_cost(params.iterations)
        .p_cost(params.parallelism)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon_params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a PHC hash in constant time
///
/// Returns `Ok(false)` on mismatch and an error only if the hash itself is
/// unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters are embedded in the hash
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Random per-user salt for the `users.salt` column
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Default [`Authenticator`] backed by Argon2id
#[derive(Debug, Clone, Default)]
pub struct Argon2Authenticator {
    params: HashingParams,
}

impl Argon2Authenticator {
    pub fn new(params: HashingParams) -> Self {
        Self { params }
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        verify_password(password, hash)
    }
}

#[async_trait]
impl Authenticator for Argon2Authenticator {
    async fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_string();
        let params = self.params;

        tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|e| PasswordError::HashError(format!("Hashing task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheap parameters keep the suite fast
    fn test_params() -> HashingParams {
        HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_hash_password_default_params() {
        let hash = hash_password("test_password_123", &HashingParams::default())
            .expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password", &test_params()).expect("Hash 1 should succeed");
        let hash2 = hash_password("same_password", &test_params()).expect("Hash 2 should succeed");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password", &test_params()).expect("Hash should succeed");

        assert!(verify_password("correct_password", &hash).expect("Verify should succeed"));
        assert!(!verify_password("wrong_password", &hash).expect("Verify should succeed"));
        assert!(!verify_password("", &hash).expect("Verify should succeed"));
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash").is_err());
        // parses as a PHC string, so this is a plain mismatch
        assert_eq!(verify_password("password", "$argon2id$invalid").ok(), Some(false));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let params = HashingParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            hash_password("password", &params),
            Err(PasswordError::HashError(_))
        ));
    }

    #[test]
    fn test_generate_salt() {
        let salt1 = generate_salt();
        let salt2 = generate_salt();
        assert_eq!(salt1.len(), SALT_LENGTH);
        assert_ne!(salt1, salt2);
    }

    #[tokio::test]
    async fn test_authenticator_hashes_off_thread() {
        let authenticator = Argon2Authenticator::new(test_params());
        let hash = authenticator
            .hash_password("seed_password")
            .await
            .expect("Hash should succeed");

        assert!(authenticator.verify("seed_password", &hash).unwrap());
    }
}
