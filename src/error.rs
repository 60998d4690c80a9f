//!
//! # Custom Error Handling
//!
//! This module defines `AppError`, the HTTP-facing error type of the service.
//! The authentication and authorization core has its own small error enums
//! (`TokenError`, `AuthError`, `RoleStoreError`, `LookupError`) and a `DenyReason`
//! carried by rejected decisions; all of them convert into `AppError` so handlers
//! and the request gate can use the `?` operator and let Actix Web render the
//! response.
//!
//! Authorization failures never leak infrastructure state: an unavailable role
//! store surfaces exactly like a missing role, as a generic `403 Forbidden`.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::auth::principal::AuthError;
use crate::auth::token::TokenError;
use crate::authz::engine::DenyReason;
use crate::authz::store::RoleStoreError;

/// Represents all possible errors that can surface from a request handler.
///
/// Each variant carries a message and maps to one HTTP status code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed or is missing (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The principal is authenticated but may not perform the action (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// Malformed or semantically invalid request (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// The requested resource does not exist (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// Unexpected server-side error (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    /// Error originating from database operations (HTTP 500).
    #[error("Database Error: {0}")]
    DatabaseError(String),
    /// Input validation failed (HTTP 422).
    #[error("Validation Error: {0}")]
    ValidationError(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let msg = match self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::DatabaseError(msg)
            | AppError::ValidationError(msg) => msg,
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": msg }))
    }
}

/// `RowNotFound` becomes `NotFound`; everything else is a database error.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> AppError {
        match error {
            AuthError::MissingCredentials => AppError::Unauthorized("Missing token".into()),
            AuthError::InvalidToken(e) => e.into(),
        }
    }
}

/// Store outages are reported as a plain authorization failure.
impl From<RoleStoreError> for AppError {
    fn from(_: RoleStoreError) -> AppError {
        AppError::Forbidden("Forbidden".into())
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> AppError {
        match reason {
            DenyReason::Unauthenticated => AppError::Unauthorized("Missing token".into()),
            DenyReason::InvalidToken => AppError::Unauthorized("Invalid token".into()),
            DenyReason::InsufficientRole | DenyReason::StoreUnavailable => {
                AppError::Forbidden("Forbidden".into())
            }
            DenyReason::ResourceNotFound => AppError::NotFound("Resource not found".into()),
        }
    }
}
