pub mod password;
pub mod session;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::User;
use crate::database::StoreError;

pub use password::{hash_password, verify_absent, verify_password};
pub use session::{LoginOutcome, SessionManager};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token revoked or expired")]
    Revoked,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authenticated actor attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// HS256 signing keys derived from the configured secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.decoding, &Validation::default())?.claims)
    }
}

/// Stored form of a token id: lowercase hex SHA-256.
pub fn token_hash(jti: &str) -> String {
    format!("{:x}", Sha256::digest(jti.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip_claims() {
        let signer = TokenSigner::new("test-secret").unwrap();
        let claims = Claims::new(42, Duration::hours(1));
        let token = signer.sign(&claims).unwrap();
        let decoded = signer.verify(&token).unwrap();
        assert_eq!(decoded.sub, 42);
        assert_eq!(decoded.jti, claims.jti);
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = TokenSigner::new("a").unwrap().sign(&Claims::new(1, Duration::hours(1))).unwrap();
        let err = TokenSigner::new("b").unwrap().verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Token(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new("test-secret").unwrap();
        let token = signer.sign(&Claims::new(1, Duration::hours(-2))).unwrap();
        assert!(matches!(signer.verify(&token), Err(AuthError::Token(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenSigner::new(""), Err(AuthError::MissingSecret)));
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = token_hash("abc");
        assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
