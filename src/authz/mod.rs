//! Resource-level authorization for tasks and comments.
//!
//! Comments carry no roles of their own; every decision about a comment is
//! made against the role the principal holds on the comment's parent task.

pub mod engine;
pub mod gate;
pub mod pg_store;
pub mod role;
pub mod store;
pub mod target;

pub use engine::{Decision, DecisionEngine, DenyReason, ResourceRef};
pub use gate::{AuthorizedRequest, GateState, RequestGate};
pub use pg_store::PgRoleStore;
pub use role::{Action, Role};
pub use store::{InMemoryRoleStore, RoleAssignment, RoleStore, RoleStoreError, TimeoutRoleStore};
pub use target::{
    InMemoryResourceLoader, LookupError, PgResourceLoader, ResourceLoader, RouteTarget, TargetKind,
    TimeoutResourceLoader,
};
