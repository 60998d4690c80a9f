use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::principal::Principal;
use crate::authz::AuthorizedRequest;
use crate::error::AppError;

/// Extracts the principal the gate attached to the request.
///
/// Only available on routes wrapped by `GateMiddleware`; anywhere else the
/// extractor fails with `401 Unauthorized`.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

impl FromRequest for AuthenticatedPrincipal {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Principal>().cloned() {
            Some(principal) => ready(Ok(AuthenticatedPrincipal(principal))),
            None => {
                let err = AppError::Unauthorized(
                    "Principal not found in request. Ensure GateMiddleware is active.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

/// Extracts the full authorization outcome: principal, resource and action.
#[derive(Debug, Clone)]
pub struct AuthorizedResource(pub AuthorizedRequest);

impl FromRequest for AuthorizedResource {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthorizedRequest>().cloned() {
            Some(authorized) => ready(Ok(AuthorizedResource(authorized))),
            None => {
                let err = AppError::Unauthorized("Request was not authorized".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
