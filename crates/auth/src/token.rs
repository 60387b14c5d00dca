//! Token issuance and resolution.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use uuid::Uuid;

use usergate_core::UserId;

use crate::claims::{JwtClaims, TokenError, TokenKind, validate_claims};

/// Result of a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Issues tokens bound to a user and resolves them back to that user.
///
/// Implementations must be pure with respect to the identity store: whether
/// the user still exists is the caller's concern.
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<TokenPair, TokenError>;

    /// Verify `token` and return its subject, provided it is of `kind`.
    fn resolve(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<UserId, TokenError>;
}

/// HS256-signed JWT token service.
#[derive(Clone)]
pub struct Hs256TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for Hs256TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256TokenService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl Hs256TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn mint(&self, sub: UserId, kind: TokenKind, now: DateTime<Utc>) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing(format!("{kind:?} token expiry out of range")))?;
        let claims = JwtClaims {
            sub,
            kind,
            jti: Uuid::now_v7(),
            issued_at: now,
            expires_at,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validation() -> Validation {
        // Expiry lives in our own claims and is checked by `validate_claims`
        // against an injected clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation
    }

    /// Decode and verify the signature, without checking the time window.
    pub fn decode_claims(&self, token: &str) -> Result<JwtClaims, TokenError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Self::validation())
            .map(|data| data.claims)
            .map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

impl TokenService for Hs256TokenService {
    fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.mint(user_id, TokenKind::Access, now)?,
            refresh_token: self.mint(user_id, TokenKind::Refresh, now)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn resolve(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let claims = self.decode_claims(token)?;
        validate_claims(&claims, now)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind {
                expected: kind,
                found: claims.kind,
            });
        }
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Hs256TokenService {
        Hs256TokenService::new(b"test-secret", Duration::seconds(300), Duration::seconds(3600))
    }

    #[test]
    fn issued_pair_resolves_to_the_user() {
        let tokens = service();
        let user = UserId::new();
        let now = Utc::now();

        let pair = tokens.issue(user, now).unwrap();
        assert_eq!(pair.expires_in, 300);
        assert_ne!(pair.access_token, pair.refresh_token);

        assert_eq!(tokens.resolve(&pair.access_token, TokenKind::Access, now), Ok(user));
        assert_eq!(tokens.resolve(&pair.refresh_token, TokenKind::Refresh, now), Ok(user));
    }

    #[test]
    fn out_of_range_expiry_is_an_error() {
        let tokens = Hs256TokenService::new(
            b"test-secret",
            Duration::days(365 * 300_000),
            Duration::seconds(3600),
        );
        assert!(matches!(
            tokens.issue(UserId::new(), Utc::now()),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let tokens = service();
        let now = Utc::now();
        let pair = tokens.issue(UserId::new(), now).unwrap();

        assert_eq!(
            tokens.resolve(&pair.refresh_token, TokenKind::Access, now),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            })
        );
    }

    #[test]
    fn access_token_expires_before_refresh_token() {
        let tokens = service();
        let now = Utc::now();
        let pair = tokens.issue(UserId::new(), now).unwrap();
        let later = now + Duration::seconds(301);

        assert_eq!(
            tokens.resolve(&pair.access_token, TokenKind::Access, later),
            Err(TokenError::Expired)
        );
        assert!(tokens.resolve(&pair.refresh_token, TokenKind::Refresh, later).is_ok());
    }

    #[test]
    fn foreign_signature_and_garbage_are_malformed() {
        let now = Utc::now();
        let other = Hs256TokenService::new(b"other-secret", Duration::seconds(300), Duration::seconds(3600));
        let pair = other.issue(UserId::new(), now).unwrap();

        assert!(matches!(
            service().resolve(&pair.access_token, TokenKind::Access, now),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            service().resolve("not.a.jwt", TokenKind::Access, now),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let rendered = format!("{:?}", service());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("test-secret"));
    }
}
