use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::principal::Principal;
use crate::error::AppError;
use crate::models::UserId;

/// Token lifetime used when none is configured: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60 * 24;

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token, the user's unique identifier.
    pub sub: UserId,
    /// Display name of the user at sign-in time.
    pub username: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Why a token was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed")]
    Malformed,
    #[error("BadSignature")]
    BadSignature,
    #[error("Expired")]
    Expired,
}

/// Signs and verifies HS256 tokens with a key fixed at construction.
///
/// A codec is immutable once built, so one instance is shared behind an `Arc`
/// by every request handler.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Issues a token for `user_id` valid from `now` until `now + ttl`.
    ///
    /// # Returns
    /// The compact JWT string, or `AppError::InternalServerError` if encoding fails.
    pub fn sign(&self, user_id: UserId, username: &str, now: i64) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies `token` at time `now` and returns the principal it asserts.
    ///
    /// Checks run in a fixed order: the token must parse (`Malformed`), must not
    /// be past its expiry (`Expired`, whatever the signature), and must carry a
    /// valid HMAC for this codec's key (`BadSignature`). The HMAC comparison is
    /// done by `jsonwebtoken`'s verifier, which compares in constant time.
    pub fn verify(&self, token: &str, now: i64) -> Result<Principal, TokenError> {
        let unverified = self.decode_unverified(token)?;
        if now > unverified.exp {
            return Err(TokenError::Expired);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                _ => TokenError::Malformed,
            })?;

        Ok(Principal::from(claims))
    }

    fn decode_unverified(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Malformed)
    }
}
