//! Role store contract and the in-process implementations.
//!
//! A role store maps `(user, task)` to at most one [`Role`]. Every operation is
//! individually atomic; nothing here spans several keys. Backends that can hang
//! (network stores, databases) should be wrapped in [`TimeoutRoleStore`] so a
//! slow lookup turns into [`RoleStoreError::Unavailable`] instead of stalling
//! the request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::authz::role::Role;
use crate::models::{TaskId, UserId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoleStoreError {
    #[error("role store unavailable")]
    Unavailable,
}

/// One stored `(user, task) -> role` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub role: Role,
}

/// Composite key used by key-value backends.
///
/// The task id comes first so all entries of one task share a prefix.
pub fn role_key(user_id: UserId, task_id: TaskId) -> String {
    format!("{}{}", task_key_prefix(task_id), user_id)
}

fn task_key_prefix(task_id: TaskId) -> String {
    format!("task_role:{}:", task_id)
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Returns `Role::None` when no entry exists.
    async fn get_role(&self, user_id: UserId, task_id: TaskId) -> Result<Role, RoleStoreError>;

    /// Idempotent upsert. Setting `Role::None` removes the entry.
    async fn set_role(
        &self,
        user_id: UserId,
        task_id: TaskId,
        role: Role,
    ) -> Result<(), RoleStoreError>;

    /// Drops every entry of `task_id`; used when the task is deleted.
    async fn remove_all_for_task(&self, task_id: TaskId) -> Result<(), RoleStoreError>;

    async fn roles_for_task(&self, task_id: TaskId)
        -> Result<Vec<RoleAssignment>, RoleStoreError>;
}

#[async_trait]
impl<S: RoleStore + ?Sized> RoleStore for Arc<S> {
    async fn get_role(&self, user_id: UserId, task_id: TaskId) -> Result<Role, RoleStoreError> {
        (**self).get_role(user_id, task_id).await
    }

    async fn set_role(
        &self,
        user_id: UserId,
        task_id: TaskId,
        role: Role,
    ) -> Result<(), RoleStoreError> {
        (**self).set_role(user_id, task_id, role).await
    }

    async fn remove_all_for_task(&self, task_id: TaskId) -> Result<(), RoleStoreError> {
        (**self).remove_all_for_task(task_id).await
    }

    async fn roles_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        (**self).roles_for_task(task_id).await
    }
}

/// Role store held in process memory.
#[derive(Default)]
pub struct InMemoryRoleStore {
    entries: RwLock<HashMap<String, RoleAssignment>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get_role(&self, user_id: UserId, task_id: TaskId) -> Result<Role, RoleStoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&role_key(user_id, task_id))
            .map(|entry| entry.role)
            .unwrap_or_default())
    }

    async fn set_role(
        &self,
        user_id: UserId,
        task_id: TaskId,
        role: Role,
    ) -> Result<(), RoleStoreError> {
        let key = role_key(user_id, task_id);
        let mut entries = self.entries.write().await;
        if role == Role::None {
            entries.remove(&key);
        } else {
            entries.insert(
                key,
                RoleAssignment {
                    user_id,
                    task_id,
                    role,
                },
            );
        }
        Ok(())
    }

    async fn remove_all_for_task(&self, task_id: TaskId) -> Result<(), RoleStoreError> {
        let prefix = task_key_prefix(task_id);
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn roles_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        let prefix = task_key_prefix(task_id);
        let entries = self.entries.read().await;
        let mut assignments: Vec<RoleAssignment> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, entry)| entry.clone())
            .collect();
        assignments.sort_by_key(|entry| entry.user_id);
        Ok(assignments)
    }
}

/// Bounds every call of the wrapped store by `timeout`.
pub struct TimeoutRoleStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: RoleStore> TimeoutRoleStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, RoleStoreError>
    where
        F: Future<Output = Result<T, RoleStoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("role store {} timed out after {:?}", op, self.timeout);
                Err(RoleStoreError::Unavailable)
            }
        }
    }
}

#[async_trait]
impl<S: RoleStore> RoleStore for TimeoutRoleStore<S> {
    async fn get_role(&self, user_id: UserId, task_id: TaskId) -> Result<Role, RoleStoreError> {
        self.bounded("get_role", self.inner.get_role(user_id, task_id))
            .await
    }

    async fn set_role(
        &self,
        user_id: UserId,
        task_id: TaskId,
        role: Role,
    ) -> Result<(), RoleStoreError> {
        self.bounded("set_role", self.inner.set_role(user_id, task_id, role))
            .await
    }

    async fn remove_all_for_task(&self, task_id: TaskId) -> Result<(), RoleStoreError> {
        self.bounded("remove_all_for_task", self.inner.remove_all_for_task(task_id))
            .await
    }

    async fn roles_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        self.bounded("roles_for_task", self.inner.roles_for_task(task_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    /// Never answers.
    struct HangingStore;

    #[async_trait]
    impl RoleStore for HangingStore {
        async fn get_role(&self, _: UserId, _: TaskId) -> Result<Role, RoleStoreError> {
            futures::future::pending().await
        }

        async fn set_role(&self, _: UserId, _: TaskId, _: Role) -> Result<(), RoleStoreError> {
            futures::future::pending().await
        }

        async fn remove_all_for_task(&self, _: TaskId) -> Result<(), RoleStoreError> {
            futures::future::pending().await
        }

        async fn roles_for_task(&self, _: TaskId) -> Result<Vec<RoleAssignment>, RoleStoreError> {
            futures::future::pending().await
        }
    }

    #[test]
    fn test_role_key_layout() {
        let task_id = Uuid::nil();
        assert_eq!(
            role_key(42, task_id),
            "task_role:00000000-0000-0000-0000-000000000000:42"
        );
    }

    #[actix_rt::test]
    async fn test_absent_entry_is_none() {
        let store = InMemoryRoleStore::new();
        assert_eq!(store.get_role(1, Uuid::new_v4()).await, Ok(Role::None));
    }

    #[actix_rt::test]
    async fn test_set_role_is_an_upsert() {
        let store = InMemoryRoleStore::new();
        let task_id = Uuid::new_v4();

        store.set_role(7, task_id, Role::Viewer).await.unwrap();
        store.set_role(7, task_id, Role::Viewer).await.unwrap();
        store.set_role(7, task_id, Role::Collaborator).await.unwrap();

        assert_eq!(store.get_role(7, task_id).await, Ok(Role::Collaborator));
        assert_eq!(store.roles_for_task(task_id).await.unwrap().len(), 1);

        store.set_role(7, task_id, Role::None).await.unwrap();
        assert_eq!(store.get_role(7, task_id).await, Ok(Role::None));
        assert!(store.roles_for_task(task_id).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_remove_all_for_task_leaves_other_tasks() {
        let store = InMemoryRoleStore::new();
        let doomed = Uuid::new_v4();
        let kept = Uuid::new_v4();

        store.set_role(1, doomed, Role::Owner).await.unwrap();
        store.set_role(2, doomed, Role::Viewer).await.unwrap();
        store.set_role(1, kept, Role::Owner).await.unwrap();

        store.remove_all_for_task(doomed).await.unwrap();

        assert_eq!(store.get_role(1, doomed).await, Ok(Role::None));
        assert_eq!(store.get_role(2, doomed).await, Ok(Role::None));
        assert_eq!(store.get_role(1, kept).await, Ok(Role::Owner));
    }

    #[actix_rt::test]
    async fn test_roles_for_task_sorted_by_user() {
        let store = InMemoryRoleStore::new();
        let task_id = Uuid::new_v4();
        store.set_role(9, task_id, Role::Viewer).await.unwrap();
        store.set_role(3, task_id, Role::Owner).await.unwrap();

        let roles = store.roles_for_task(task_id).await.unwrap();
        assert_eq!(
            roles,
            vec![
                RoleAssignment {
                    user_id: 3,
                    task_id,
                    role: Role::Owner
                },
                RoleAssignment {
                    user_id: 9,
                    task_id,
                    role: Role::Viewer
                },
            ]
        );
    }

    #[actix_rt::test]
    async fn test_timeout_reports_unavailable() {
        let store = TimeoutRoleStore::new(HangingStore, Duration::from_millis(20));
        let task_id = Uuid::new_v4();

        assert_eq!(
            store.get_role(1, task_id).await,
            Err(RoleStoreError::Unavailable)
        );
        assert_eq!(
            store.set_role(1, task_id, Role::Owner).await,
            Err(RoleStoreError::Unavailable)
        );
        assert_eq!(
            store.remove_all_for_task(task_id).await,
            Err(RoleStoreError::Unavailable)
        );
    }

    #[actix_rt::test]
    async fn test_timeout_passes_through_fast_answers() {
        let inner = Arc::new(InMemoryRoleStore::new());
        let task_id = Uuid::new_v4();
        inner.set_role(5, task_id, Role::Viewer).await.unwrap();

        let store = TimeoutRoleStore::new(inner, Duration::from_secs(1));
        assert_eq!(store.get_role(5, task_id).await, Ok(Role::Viewer));
    }
}
