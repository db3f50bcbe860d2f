//! Password hashing using Argon2id
//!
//! Stored passwords are PHC strings (`$argon2id$v=19$m=...`), so the
//! parameters travel with each hash and verification needs no other context.
//!
//! # Example
//!
//! ```rust
//! use tourbook::password::PasswordHasher;
//!
//! let hasher = PasswordHasher::default();
//! let hash = hasher.hash("correct horse").unwrap();
//! assert!(hash.starts_with("$argon2id$"));
//! assert!(hasher.verify("correct horse", &hash).unwrap());
//! assert!(!hasher.verify("battery staple", &hash).unwrap());
//! ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::error::{Error, Result};

/// OWASP minimum for Argon2id: 19 MiB, two passes, one lane
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

/// Argon2id hasher
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
                .unwrap_or_default(),
        }
    }
}

impl PasswordHasher {
    /// Hash with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Check `password` against a stored hash
    ///
    /// A mismatch is `Ok(false)`; only a malformed hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("Password verification failed: {}", e))),
        }
    }
}

/// Whether `value` is already a PHC hash rather than a plaintext password
pub fn is_hashed(value: &str) -> bool {
    value.starts_with("$argon2")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_salted() {
        let hasher = PasswordHasher::default();
        let first = hasher.hash("pass1234").unwrap();
        let second = hasher.hash("pass1234").unwrap();
        assert_ne!(first, second);
        assert!(is_hashed(&first));
        assert!(!first.contains("pass1234"));
    }

    #[test]
    fn test_verify() {
        let hasher = PasswordHasher::default();
        let hash = hasher.hash("pass1234").unwrap();
        assert!(hasher.verify("pass1234", &hash).unwrap());
        assert!(!hasher.verify("pass12345", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        let err = PasswordHasher::default().verify("pass1234", "pass1234").unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
