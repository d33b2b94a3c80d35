use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::AuthConfig;
use crate::error::{Result, ServiceError};

/// Argon2id password hashing with a per-record random salt and a fixed,
/// configured work factor.
///
/// Callers are responsible for rejecting empty passwords before they get here.
#[derive(Clone)]
pub struct CredentialStore {
    argon2: Argon2<'static>,
}

impl CredentialStore {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| ServiceError::Internal(format!("Invalid password hash parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC-format digest
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored digest.
    ///
    /// The digest carries its own parameters, so hashes made under an older
    /// work factor still verify.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(h) => h,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// [`Self::hash`] on the blocking pool
    pub async fn hash_blocking(&self, password: String) -> Result<String> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.hash(&password))
            .await
            .map_err(|e| ServiceError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// [`Self::verify`] on the blocking pool
    pub async fn verify_blocking(&self, password: String, digest: String) -> Result<bool> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.verify(&password, &digest))
            .await
            .map_err(|e| ServiceError::Internal(format!("Password verification task failed: {}", e)))
    }
}
