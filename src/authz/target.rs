//! Maps an inbound request to the resource and action it targets.
//!
//! Mapping happens in two steps: [`RouteTarget::parse`] reads ids and the
//! action from the method and path without touching storage, then
//! [`RouteTarget::load`] asks a [`ResourceLoader`] for the ownership data the
//! decision engine needs. Paths that do not match a known resource shape are
//! unmapped, and the gate rejects them.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use actix_web::http::Method;
use async_trait::async_trait;
use log::{error, warn};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::authz::engine::ResourceRef;
use crate::authz::role::Action;
use crate::models::{CommentId, TaskId, UserId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    #[error("resource not found")]
    NotFound,
    #[error("resource lookup unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    NewTask,
    Task(TaskId),
    TaskComments(TaskId),
    Comment {
        task_id: TaskId,
        comment_id: CommentId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTarget {
    pub kind: TargetKind,
    pub action: Action,
}

fn action_for(method: &Method) -> Option<Action> {
    match *method {
        Method::GET => Some(Action::Read),
        Method::POST => Some(Action::Create),
        Method::PUT | Method::PATCH => Some(Action::Update),
        Method::DELETE => Some(Action::Delete),
        _ => None,
    }
}

impl RouteTarget {
    /// Parses a path of the gated API, with or without its `/api` prefix.
    pub fn parse(method: &Method, path: &str) -> Option<Self> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.first() == Some(&"api") {
            segments.remove(0);
        }
        let action = action_for(method)?;

        let (kind, action) = match segments.as_slice() {
            ["tasks"] if action == Action::Create => (TargetKind::NewTask, action),
            ["tasks", id] if action != Action::Create => (TargetKind::Task(id.parse().ok()?), action),
            ["tasks", id, "roles"] if action == Action::Read => {
                (TargetKind::Task(id.parse().ok()?), action)
            }
            ["tasks", id, "roles", user_id]
                if matches!(action, Action::Update | Action::Delete) =>
            {
                user_id.parse::<UserId>().ok()?;
                (TargetKind::Task(id.parse().ok()?), Action::ManageAccess)
            }
            ["tasks", id, "comments"] if matches!(action, Action::Read | Action::Create) => {
                (TargetKind::TaskComments(id.parse().ok()?), action)
            }
            ["tasks", id, "comments", comment_id] if action != Action::Create => (
                TargetKind::Comment {
                    task_id: id.parse().ok()?,
                    comment_id: comment_id.parse().ok()?,
                },
                action,
            ),
            _ => return None,
        };

        Some(Self { kind, action })
    }

    /// Resolves the target into a `ResourceRef` using `loader`.
    pub async fn load(&self, loader: &dyn ResourceLoader) -> Result<ResourceRef, LookupError> {
        match self.kind {
            TargetKind::NewTask => Ok(ResourceRef::new_task()),
            TargetKind::Task(task_id) => {
                let owner_id = loader.task_owner(task_id).await?.ok_or(LookupError::NotFound)?;
                Ok(ResourceRef::Task {
                    id: Some(task_id),
                    owner_id: Some(owner_id),
                })
            }
            TargetKind::TaskComments(task_id) => {
                loader.task_owner(task_id).await?.ok_or(LookupError::NotFound)?;
                Ok(ResourceRef::Comment {
                    id: None,
                    task_id,
                    author_id: None,
                })
            }
            TargetKind::Comment {
                task_id,
                comment_id,
            } => {
                let (parent, author_id) = loader
                    .comment_parent(comment_id)
                    .await?
                    .ok_or(LookupError::NotFound)?;
                // A comment addressed through the wrong task does not exist there.
                if parent != task_id {
                    return Err(LookupError::NotFound);
                }
                Ok(ResourceRef::Comment {
                    id: Some(comment_id),
                    task_id,
                    author_id: Some(author_id),
                })
            }
        }
    }
}

/// Reads the ownership facts of tasks and comments.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn task_owner(&self, task_id: TaskId) -> Result<Option<UserId>, LookupError>;

    /// Returns the parent task and author of a comment.
    async fn comment_parent(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<(TaskId, UserId)>, LookupError>;
}

/// Loader reading the `tasks` and `comments` tables.
#[derive(Clone)]
pub struct PgResourceLoader {
    pool: PgPool,
}

impl PgResourceLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceLoader for PgResourceLoader {
    async fn task_owner(&self, task_id: TaskId) -> Result<Option<UserId>, LookupError> {
        sqlx::query_scalar::<_, UserId>("SELECT owner_id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("task lookup failed: {}", e);
                LookupError::Unavailable
            })
    }

    async fn comment_parent(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<(TaskId, UserId)>, LookupError> {
        sqlx::query_as::<_, (Uuid, UserId)>("SELECT task_id, author_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("comment lookup failed: {}", e);
                LookupError::Unavailable
            })
    }
}

/// Loader over an in-process registry of tasks and comments.
#[derive(Default)]
pub struct InMemoryResourceLoader {
    tasks: RwLock<HashMap<TaskId, UserId>>,
    comments: RwLock<HashMap<CommentId, (TaskId, UserId)>>,
}

impl InMemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_task(&self, task_id: TaskId, owner_id: UserId) {
        self.tasks.write().await.insert(task_id, owner_id);
    }

    pub async fn insert_comment(&self, comment_id: CommentId, task_id: TaskId, author_id: UserId) {
        self.comments
            .write()
            .await
            .insert(comment_id, (task_id, author_id));
    }

    pub async fn remove_task(&self, task_id: TaskId) {
        self.tasks.write().await.remove(&task_id);
        self.comments
            .write()
            .await
            .retain(|_, (parent, _)| *parent != task_id);
    }
}

#[async_trait]
impl ResourceLoader for InMemoryResourceLoader {
    async fn task_owner(&self, task_id: TaskId) -> Result<Option<UserId>, LookupError> {
        Ok(self.tasks.read().await.get(&task_id).copied())
    }

    async fn comment_parent(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<(TaskId, UserId)>, LookupError> {
        Ok(self.comments.read().await.get(&comment_id).copied())
    }
}

/// Bounds every lookup of the wrapped loader by `timeout`.
pub struct TimeoutResourceLoader<L> {
    inner: L,
    timeout: Duration,
}

impl<L: ResourceLoader> TimeoutResourceLoader<L> {
    pub fn new(inner: L, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, LookupError>
    where
        F: Future<Output = Result<T, LookupError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("resource {} timed out after {:?}", op, self.timeout);
                Err(LookupError::Unavailable)
            }
        }
    }
}

#[async_trait]
impl<L: ResourceLoader> ResourceLoader for TimeoutResourceLoader<L> {
    async fn task_owner(&self, task_id: TaskId) -> Result<Option<UserId>, LookupError> {
        self.bounded("task_owner", self.inner.task_owner(task_id))
            .await
    }

    async fn comment_parent(
        &self,
        comment_id: CommentId,
    ) -> Result<Option<(TaskId, UserId)>, LookupError> {
        self.bounded("comment_parent", self.inner.comment_parent(comment_id))
            .await
    }
}
