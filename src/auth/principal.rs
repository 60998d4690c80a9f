use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::auth::token::{Claims, TokenCodec, TokenError};
use crate::models::UserId;

/// Scheme prefix expected in the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated identity attached to one request.
///
/// Built fresh for every request from a verified token and passed explicitly
/// to whatever needs it; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
}

/// Turns a raw `Authorization` header value into a `Principal`.
#[derive(Clone)]
pub struct PrincipalResolver {
    codec: Arc<TokenCodec>,
}

impl PrincipalResolver {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// An absent, empty, or non-`Bearer` header carries no credentials at all;
    /// anything after the prefix is handed to the codec.
    pub fn resolve(&self, header: Option<&str>, now: i64) -> Result<Principal, AuthError> {
        let token = header
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .ok_or(AuthError::MissingCredentials)?;

        Ok(self.codec.verify(token.trim(), now)?)
    }
}
