//! Password hashing using Argon2id.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{AuthError, AuthResult};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = leadforge_core::defaults::PASSWORD_MIN_LENGTH;

/// Argon2id parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashParams {
    /// Memory in KiB (default: 19456 = 19 MiB).
    pub memory_kib: u32,
    /// Time iterations (default: 2).
    pub iterations: u32,
    /// Parallelism degree (default: 1).
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashParams {
    /// Cheap parameters for tests. Never use for stored credentials.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Hashes and verifies passwords as PHC strings.
#[derive(Debug, Clone)]
pub struct PasswordHasherService {
    params: HashParams,
}

impl Default for PasswordHasherService {
    fn default() -> Self {
        Self::new(HashParams::default())
    }
}

impl PasswordHasherService {
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    fn argon2(&self) -> AuthResult<Argon2<'static>> {
        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a password into a `$argon2id$...` PHC string.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        validate_password(password)?;

        let mut salt_bytes = Zeroizing::new([0u8; 16]);
        rand::thread_rng().fill_bytes(salt_bytes.as_mut());
        let salt = SaltString::encode_b64(salt_bytes.as_ref())
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC string.
    ///
    /// Returns `Ok(false)` on mismatch; errors only on a malformed hash.
    pub fn verify(&self, password: &str, stored: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(stored).map_err(|e| AuthError::MalformedHash(e.to_string()))?;
        match self.argon2()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::MalformedHash(e.to_string())),
        }
    }
}

/// Validate password strength.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasherService {
        PasswordHasherService::new(HashParams::insecure_fast())
    }

    #[test]
    fn test_hash_and_verify() {
        let h = hasher();
        let hash = h.hash("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(h.verify("correct horse battery", &hash).unwrap());
        assert!(!h.verify("wrong horse battery", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let h = hasher();
        let a = h.hash("password123").unwrap();
        let b = h.hash("password123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_password_rejected() {
        let err = hasher().hash("short").unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooShort(8)));
    }

    #[test]
    fn test_malformed_hash() {
        let err = hasher().verify("password123", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AuthError::MalformedHash(_)));
    }

    #[test]
    fn test_verify_uses_params_from_hash() {
        let stored = hasher().hash("password123").unwrap();
        // A service with different parameters still verifies existing hashes.
        assert!(PasswordHasherService::default()
            .verify("password123", &stored)
            .unwrap());
    }
}
