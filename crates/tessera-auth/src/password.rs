//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher as _, PasswordVerifier};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Argon2id hasher with a configurable work factor.
///
/// Hashing is CPU-bound; the session engine runs it on the
/// blocking thread pool.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: argon2::Params,
    pepper: Option<String>,
}

impl PasswordHasher {
    pub fn new(time_cost: u32, memory_kib: u32, pepper: Option<String>) -> Result<Self, AuthError> {
        let params = argon2::Params::new(memory_kib, time_cost, 1, None)
            .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
        Ok(Self { params, pepper })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(
            config.hash_cost,
            config.hash_memory_kib,
            config.pepper.clone(),
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash a password into a salted PHC string.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let peppered = with_pepper(password, self.pepper.as_deref());
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a PHC-format hash.
    ///
    /// The cost parameters embedded in `hash` win over the configured
    /// ones, so hashes made under an older work factor still verify.
    /// Returns `Ok(false)` on mismatch and `Err(AuthError::Crypto)` if
    /// the stored hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let peppered = with_pepper(password, self.pepper.as_deref());
        let parsed_hash = argon2::PasswordHash::new(hash)
            .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

        match self.argon2().verify_password(peppered.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
        }
    }
}

fn with_pepper(password: &str, pepper: Option<&str>) -> String {
    match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_string(),
    }
}
