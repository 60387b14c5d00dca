//! Password verification against stored credential hashes.
//!
//! Hashing is deliberately slow, so it always runs outside the store lock:
//! the stored hash is copied out in a read, checked, and a new hash is
//! computed before the write transaction that replaces it.
//!
//! An unknown username is checked against a decoy hash, so a failed login
//! costs the same whether or not the account exists.

use std::sync::{Arc, OnceLock};

use usergate_auth::CredentialHasher;
use usergate_core::{DomainError, UserId};

use crate::store::{IdentityStore, StoreError};

const DECOY_PASSWORD: &str = "usergate-decoy-credential";

pub struct CredentialVerifier<S> {
    store: S,
    hasher: Arc<dyn CredentialHasher>,
    decoy: OnceLock<String>,
}

impl<S: IdentityStore> CredentialVerifier<S> {
    pub fn new(store: S, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            store,
            hasher,
            decoy: OnceLock::new(),
        }
    }

    /// Hash of a password no account has, computed on first use with the
    /// same parameters as real credentials.
    fn decoy_hash(&self) -> &str {
        self.decoy.get_or_init(|| {
            self.hasher.hash(DECOY_PASSWORD).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "decoy hash unavailable");
                String::new()
            })
        })
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, StoreError> {
        Ok(self.hasher.hash(plaintext)?)
    }

    /// True iff `plaintext` matches the stored hash of `user`.
    /// Unknown users never match.
    pub fn verify(&self, user: &UserId, plaintext: &str) -> Result<bool, StoreError> {
        let stored = self
            .store
            .read(|dir| Ok(dir.user(user).map(|u| u.password_hash.clone())))?;
        Ok(stored.is_some_and(|hash| self.hasher.verify(plaintext, &hash)))
    }

    /// Resolve a username/password pair to a user id.
    pub fn authenticate(&self, username: &str, plaintext: &str) -> Result<Option<UserId>, StoreError> {
        let found = self.store.read(|dir| {
            Ok(dir
                .user_by_username(username.trim())
                .map(|u| (u.id, u.password_hash.clone())))
        })?;
        let Some((id, hash)) = found else {
            let _ = self.hasher.verify(plaintext, self.decoy_hash());
            tracing::debug!(%username, "login for unknown username");
            return Ok(None);
        };
        if self.hasher.verify(plaintext, &hash) {
            Ok(Some(id))
        } else {
            tracing::debug!(user_id = %id, "password mismatch");
            Ok(None)
        }
    }

    /// Replace the credential of `user`. The new password must be non-empty.
    pub fn set_password(&self, user: &UserId, plaintext: &str) -> Result<(), StoreError> {
        if plaintext.is_empty() {
            return Err(DomainError::validation("password cannot be empty").into());
        }
        let hash = self.hash(plaintext)?;
        self.store.transaction(|dir| {
            dir.update_user(user, |u| u.password_hash = hash)?;
            Ok(())
        })
    }
}
