//! Bearer tokens, password hashing and reset tokens.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use ulid::Ulid;

use crate::access::Identity;
use crate::limits::{RESET_TOKEN_BYTES, TOKEN_TTL_DAYS};
use crate::model::Role;

/// `sub` of the administrator's tokens.
pub const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug)]
pub enum AuthError {
    /// Missing, malformed, tampered or expired token.
    InvalidToken,
    Hashing(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "invalid or expired token"),
            AuthError::Hashing(e) => write!(f, "password hashing failed: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Customer id, or [`ADMIN_SUBJECT`].
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(identity: &Identity, email: &str, expires_in: Duration) -> Self {
        let now = Utc::now();
        let sub = match identity {
            Identity::Admin => ADMIN_SUBJECT.to_string(),
            Identity::Customer(id) => id.to_string(),
        };
        Self {
            sub,
            email: email.to_string(),
            role: identity.role(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    /// The caller the claims describe. Role and subject must agree.
    pub fn identity(&self) -> Result<Identity, AuthError> {
        match self.role {
            Role::Admin if self.sub == ADMIN_SUBJECT => Ok(Identity::Admin),
            Role::Customer => Ulid::from_string(&self.sub)
                .map(Identity::Customer)
                .map_err(|_| AuthError::InvalidToken),
            Role::Admin => Err(AuthError::InvalidToken),
        }
    }
}

/// Signs and verifies HS256 bearer tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::days(TOKEN_TTL_DAYS),
        }
    }

    pub fn issue(&self, identity: &Identity, email: &str) -> Result<String, AuthError> {
        self.encode(&Claims::new(identity, email, self.ttl))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Signature and expiry checked; a failure says nothing about which.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                AuthError::InvalidToken
            })
    }
}

/// Argon2id with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// `false` for a wrong password or an unreadable stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Compares the configured admin password in constant time. Both sides are
/// hashed first so the configured length does not show in the timing.
pub fn secrets_match(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given.ct_eq(&expected).into()
}

/// Fresh reset token for the email link, hex-encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// What is stored in place of the token itself.
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_for_customer() {
        let issuer = TokenIssuer::new(b"test-secret");
        let id = Ulid::new();
        let token = issuer.issue(&Identity::Customer(id), "jo@example.com").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.identity().unwrap(), Identity::Customer(id));
        assert_eq!(claims.email, "jo@example.com");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 3600);
    }

    #[test]
    fn token_roundtrip_for_admin() {
        let issuer = TokenIssuer::new(b"test-secret");
        let token = issuer.issue(&Identity::Admin, "admin@pension.local").unwrap();
        assert_eq!(issuer.verify(&token).unwrap().identity().unwrap(), Identity::Admin);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = TokenIssuer::new(b"one").issue(&Identity::Admin, "a@b.c").unwrap();
        assert!(matches!(TokenIssuer::new(b"two").verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_rejected() {
        let issuer = TokenIssuer::new(b"test-secret");
        let claims = Claims::new(&Identity::Admin, "a@b.c", Duration::seconds(-10));
        let token = issuer.encode(&claims).unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn tampered_token_rejected() {
        let issuer = TokenIssuer::new(b"test-secret");
        let forged = issuer
            .issue(&Identity::Admin, "a@b.c")
            .unwrap()
            .split('.')
            .nth(1)
            .unwrap()
            .to_string();
        let token = TokenIssuer::new(b"other")
            .issue(&Identity::Customer(Ulid::new()), "a@b.c")
            .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged;
        assert!(issuer.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn customer_role_with_admin_subject_rejected() {
        let claims = Claims {
            sub: ADMIN_SUBJECT.into(),
            email: "x@y.z".into(),
            role: Role::Customer,
            iat: 0,
            exp: 0,
        };
        assert!(claims.identity().is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("pw1234").unwrap(), hash_password("pw1234").unwrap());
    }

    #[test]
    fn reset_tokens_are_random_hex() {
        let a = generate_reset_token();
        assert_eq!(a.len(), RESET_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, generate_reset_token());
        assert_eq!(hash_reset_token(&a), hash_reset_token(&a));
        assert_ne!(hash_reset_token(&a), a);
    }

    #[test]
    fn secrets_compare() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cre"));
        assert!(!secrets_match("s3cret", "s3creT"));
        assert!(!secrets_match("", "s3cret"));
        assert!(!secrets_match("s3cret-and-more", "s3cret"));
    }
}
