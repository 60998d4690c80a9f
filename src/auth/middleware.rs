use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::{debug, info};

use crate::authz::{DenyReason, GateState, RequestGate, RouteTarget};
use crate::error::AppError;

/// Paths under the gated scope that need no credentials.
const PUBLIC_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/register"];

/// Exact match, tolerating one trailing slash.
fn is_public(path: &str) -> bool {
    let path = path.strip_suffix('/').unwrap_or(path);
    PUBLIC_PATHS.contains(&path)
}

/// Runs the request gate in front of every wrapped route.
///
/// Authorized requests continue with their `Principal` and `AuthorizedRequest`
/// stored in the request extensions. Rejected requests are answered here and
/// never reach a handler.
pub struct GateMiddleware {
    gate: Arc<RequestGate>,
}

impl GateMiddleware {
    pub fn new(gate: Arc<RequestGate>) -> Self {
        Self { gate }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GateMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = GateMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GateMiddlewareService {
            service: Rc::new(service),
            gate: self.gate.clone(),
        }))
    }
}

pub struct GateMiddlewareService<S> {
    service: Rc<S>,
    gate: Arc<RequestGate>,
}

impl<S, B> Service<ServiceRequest> for GateMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();
        if is_public(&path) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let target = RouteTarget::parse(req.method(), &path);
        let service = self.service.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            let now = chrono::Utc::now().timestamp();
            let reason = match gate.admit(authorization.as_deref(), target, now).await {
                GateState::Authorized(authorized) => {
                    debug!(
                        "admitted user {} for {:?} on {}",
                        authorized.principal.user_id, authorized.action, path
                    );
                    req.extensions_mut().insert(authorized.principal.clone());
                    req.extensions_mut().insert(authorized);
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
                GateState::Rejected(reason) => reason,
                // admit always returns a terminal state
                _ => DenyReason::Unauthenticated,
            };

            info!("rejected {} {}: {:?}", req.method(), path, reason);
            let response = AppError::from(reason).error_response();
            Ok(req.into_response(response).map_into_right_body())
        })
    }
}
