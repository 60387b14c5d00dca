//! Password hashing and verification using Argon2id.
//!
//! Hashes are stored in PHC string format, so the cost parameters travel with
//! each hash and a policy change does not invalidate existing credentials.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Password hashing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        // OWASP recommended settings for Argon2id
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl PasswordPolicy {
    /// Cheapest parameters Argon2 accepts. Tests only.
    pub const fn minimal() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn build_params(&self) -> Result<Params, argon2::Error> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
    }
}

/// Turns plaintext passwords into stored credential hashes and checks them.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError>;

    /// True iff `plaintext` matches `hash`. A malformed hash never matches.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Argon2id hasher.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    policy: PasswordPolicy,
}

impl Argon2Hasher {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = self
            .policy
            .build_params()
            .map_err(|e| CredentialError::Hash(e.to_string()))?;

        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("stored credential is not a valid PHC string: {e}");
                return false;
            }
        };

        // Argon2::default() can verify any Argon2 variant
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(PasswordPolicy::minimal())
    }

    #[test]
    fn hash_then_verify() {
        let h = hasher();
        let hash = h.hash("abcdefgh").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(h.verify("abcdefgh", &hash));
        assert!(!h.verify("111111", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let h = hasher();
        assert_ne!(h.hash("same").unwrap(), h.hash("same").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!hasher().verify("abcdefgh", "plaintext-in-db"));
    }

    #[test]
    fn verification_ignores_current_policy() {
        let hash = hasher().hash("abcdefgh").unwrap();
        assert!(Argon2Hasher::default().verify("abcdefgh", &hash));
    }
}
