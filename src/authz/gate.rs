//! Per-request authentication and authorization pipeline.
//!
//! A request walks a small state machine:
//!
//! ```text
//! Unauthenticated --resolve ok--> Authenticated --Allow--> Authorized
//!        |                              |
//!        +--resolve fails--> Rejected <-+--Deny / lookup fails
//! ```
//!
//! `Authorized` and `Rejected` are terminal. Business logic only runs for
//! `Authorized` requests.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::principal::{AuthError, Principal, PrincipalResolver};
use crate::authz::engine::{Decision, DecisionEngine, DenyReason, ResourceRef};
use crate::authz::role::Action;
use crate::authz::target::{LookupError, ResourceLoader, RouteTarget};

/// What a handler behind the gate is allowed to rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedRequest {
    pub principal: Principal,
    pub resource: ResourceRef,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unauthenticated,
    Authenticated(Principal),
    Authorized(AuthorizedRequest),
    Rejected(DenyReason),
}

impl From<AuthError> for DenyReason {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials => DenyReason::Unauthenticated,
            AuthError::InvalidToken(_) => DenyReason::InvalidToken,
        }
    }
}

impl From<LookupError> for DenyReason {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound => DenyReason::ResourceNotFound,
            LookupError::Unavailable => DenyReason::StoreUnavailable,
        }
    }
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GateState::Authorized(_) | GateState::Rejected(_))
    }

    /// Applies the principal resolver's outcome. Only meaningful from `Unauthenticated`.
    pub fn authenticate(self, outcome: Result<Principal, AuthError>) -> Self {
        match self {
            GateState::Unauthenticated => match outcome {
                Ok(principal) => GateState::Authenticated(principal),
                Err(e) => GateState::Rejected(e.into()),
            },
            other => other,
        }
    }

    /// Applies a decision for `resource`/`action`. Only meaningful from `Authenticated`.
    pub fn authorize(self, resource: ResourceRef, action: Action, decision: Decision) -> Self {
        match (self, decision) {
            (GateState::Authenticated(principal), Decision::Allow) => {
                GateState::Authorized(AuthorizedRequest {
                    principal,
                    resource,
                    action,
                })
            }
            (GateState::Authenticated(_), Decision::Deny(reason)) => GateState::Rejected(reason),
            (GateState::Unauthenticated, _) => GateState::Rejected(DenyReason::Unauthenticated),
            (terminal, _) => terminal,
        }
    }

    /// Rejects a non-terminal request for `reason`.
    pub fn reject(self, reason: DenyReason) -> Self {
        if self.is_terminal() {
            self
        } else {
            GateState::Rejected(reason)
        }
    }
}

/// Runs principal resolution, target loading and the decision engine for one request.
///
/// Holds no per-request state, so one instance serves all requests concurrently.
pub struct RequestGate {
    resolver: PrincipalResolver,
    engine: DecisionEngine,
    loader: Arc<dyn ResourceLoader>,
}

impl RequestGate {
    pub fn new(
        resolver: PrincipalResolver,
        engine: DecisionEngine,
        loader: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            resolver,
            engine,
            loader,
        }
    }

    /// Drives a request from `Unauthenticated` to a terminal state.
    ///
    /// `target` is `None` when the request could not be mapped to a resource;
    /// such requests are rejected once authenticated.
    pub async fn admit(
        &self,
        authorization: Option<&str>,
        target: Option<RouteTarget>,
        now: i64,
    ) -> GateState {
        let state = GateState::Unauthenticated.authenticate(self.resolver.resolve(authorization, now));
        let principal = match &state {
            GateState::Authenticated(principal) => principal.clone(),
            _ => return state,
        };

        let Some(target) = target else {
            return state.reject(DenyReason::ResourceNotFound);
        };

        let resource = match target.load(self.loader.as_ref()).await {
            Ok(resource) => resource,
            Err(e) => return state.reject(e.into()),
        };

        let decision = self.engine.decide(&principal, &resource, target.action).await;
        state.authorize(resource, target.action, decision)
    }
}
