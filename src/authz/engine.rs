use std::sync::Arc;

use log::warn;
use serde::Serialize;

use crate::auth::principal::Principal;
use crate::authz::role::{Action, Role};
use crate::authz::store::RoleStore;
use crate::models::{CommentId, TaskId, UserId};

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DenyReason {
    Unauthenticated,
    InvalidToken,
    InsufficientRole,
    StoreUnavailable,
    ResourceNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// The resource a request targets, as read from persistence by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResourceRef {
    /// `id` is `None` for a task that does not exist yet.
    Task {
        id: Option<TaskId>,
        owner_id: Option<UserId>,
    },
    /// `id` is `None` for the comment collection of `task_id`.
    Comment {
        id: Option<CommentId>,
        task_id: TaskId,
        author_id: Option<UserId>,
    },
}

impl ResourceRef {
    pub fn new_task() -> Self {
        ResourceRef::Task {
            id: None,
            owner_id: None,
        }
    }

    /// The task whose role assignments govern access to this resource.
    fn governing_task(&self) -> Option<TaskId> {
        match self {
            ResourceRef::Task { id, .. } => *id,
            ResourceRef::Comment { task_id, .. } => Some(*task_id),
        }
    }
}

/// Applies the role/action matrix.
pub fn evaluate(role: Role, action: Action) -> Decision {
    if role.permits(action) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

/// Decides whether a principal may perform an action on a resource.
///
/// The engine never writes: recording the creator of a new task as owner is
/// the caller's job once the task exists.
#[derive(Clone)]
pub struct DecisionEngine {
    roles: Arc<dyn RoleStore>,
}

impl DecisionEngine {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    pub async fn decide(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        action: Action,
    ) -> Decision {
        let task_id = match (resource.governing_task(), action) {
            (None, Action::Create) => return Decision::Allow,
            (None, _) => return Decision::Deny(DenyReason::ResourceNotFound),
            (Some(task_id), _) => task_id,
        };

        // Access to a task is only managed on the task itself.
        if matches!(resource, ResourceRef::Comment { .. }) && action == Action::ManageAccess {
            return Decision::Deny(DenyReason::InsufficientRole);
        }

        match self.roles.get_role(principal.user_id, task_id).await {
            Ok(role) => evaluate(role, action),
            Err(e) => {
                warn!(
                    "denying {:?} on task {} for user {}: {}",
                    action, task_id, principal.user_id, e
                );
                Decision::Deny(DenyReason::StoreUnavailable)
            }
        }
    }
}
