//! Session tokens (HS256 JWT) and password hashing.

use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::JwtSettings;
use crate::domain::entities::UserId;

/// Scheme expected in front of the token in the `Authorization` header.
pub const AUTH_SCHEME: &str = "Token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    Missing,
    #[error("invalid token")]
    Invalid,
    #[error("expired token")]
    Expired,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid signing key")]
    Key,
    #[error("failed to sign token: {0}")]
    Sign(#[from] jwt::Error),
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password mismatch")]
    Mismatch,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SessionClaims {
    user_id: UserId,
    exp: i64,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPrincipal {
    pub user_id: UserId,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenService {
    key: Hmac<Sha256>,
    session_timeout: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], session_timeout: Duration) -> Result<Self, TokenError> {
        let key = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| TokenError::Key)?;
        Ok(Self {
            key,
            session_timeout,
        })
    }

    pub fn from_settings(settings: &JwtSettings) -> Result<Self, TokenError> {
        Self::new(settings.secret.as_bytes(), settings.session_timeout)
    }

    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = i64::try_from(self.session_timeout.as_secs()).unwrap_or(i64::MAX);
        self.issue_with_expiry(user_id, now.saturating_add(ttl))
    }

    fn issue_with_expiry(&self, user_id: UserId, exp: i64) -> Result<String, TokenError> {
        let claims = SessionClaims { user_id, exp };
        Ok(claims.sign_with_key(&self.key)?)
    }

    pub fn verify(&self, token: &str) -> Result<AuthPrincipal, AuthError> {
        let claims: SessionClaims = token
            .verify_with_key(&self.key)
            .map_err(|_| AuthError::Invalid)?;

        if claims.exp < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(AuthPrincipal {
            user_id: claims.user_id,
            expires_at: claims.exp,
        })
    }

    /// Extract the raw token from an `Authorization: Token <jwt>` header value.
    pub fn strip_scheme(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if scheme != AUTH_SCHEME {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

pub fn verify_password(password_hash: &str, password: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(password_hash).map_err(|_| PasswordError::Mismatch)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}
