//! Authentication: who is making a request.
//!
//! Tokens are minted at sign-in by [`TokenCodec`] and turned back into a
//! [`Principal`] on every gated request by [`PrincipalResolver`].

pub mod extractors;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::UserId;

pub use extractors::{AuthenticatedPrincipal, AuthorizedResource};
pub use middleware::GateMiddleware;
pub use password::{hash_password, verify_password};
pub use principal::{AuthError, Principal, PrincipalResolver};
pub use token::{Claims, TokenCodec, TokenError};

lazy_static! {
    // alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Sign-in payload.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Registration payload. The username also becomes the token's `username` claim.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// 3 to 32 characters of `[a-zA-Z0-9_-]`.
    #[validate(
        length(min = 3, max = 32),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Returned by both sign-in endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub user_id: UserId,
}
