use async_trait::async_trait;
use log::error;
use sqlx::PgPool;

use crate::authz::role::Role;
use crate::authz::store::{RoleAssignment, RoleStore, RoleStoreError};
use crate::models::{TaskId, UserId};

/// Role store backed by the `task_roles` table.
///
/// Roles are stored as their lowercase wire names. An unreadable value is
/// treated like an outage, so the caller denies.
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes assignments whose task row no longer exists.
    ///
    /// Such rows are left behind when a task delete could not clear its
    /// roles. Returns how many were removed.
    pub async fn purge_orphans(&self) -> Result<u64, RoleStoreError> {
        sqlx::query(
            "DELETE FROM task_roles
             WHERE NOT EXISTS (SELECT 1 FROM tasks WHERE tasks.id = task_roles.task_id)",
        )
        .execute(&self.pool)
        .await
        .map(|result| result.rows_affected())
        .map_err(|e| unavailable("purge_orphans", e))
    }
}

fn unavailable(op: &str, e: sqlx::Error) -> RoleStoreError {
    error!("role store {} failed: {}", op, e);
    RoleStoreError::Unavailable
}

fn parse_role(raw: &str) -> Result<Role, RoleStoreError> {
    raw.parse().map_err(|e| {
        error!("role store holds an unreadable role: {}", e);
        RoleStoreError::Unavailable
    })
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn get_role(&self, user_id: UserId, task_id: TaskId) -> Result<Role, RoleStoreError> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT role FROM task_roles WHERE user_id = $1 AND task_id = $2",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable("get_role", e))?;

        match row {
            Some(raw) => parse_role(&raw),
            None => Ok(Role::None),
        }
    }

    async fn set_role(
        &self,
        user_id: UserId,
        task_id: TaskId,
        role: Role,
    ) -> Result<(), RoleStoreError> {
        let query = if role == Role::None {
            sqlx::query("DELETE FROM task_roles WHERE user_id = $1 AND task_id = $2")
                .bind(user_id)
                .bind(task_id)
        } else {
            sqlx::query(
                "INSERT INTO task_roles (user_id, task_id, role) VALUES ($1, $2, $3)
                 ON CONFLICT (user_id, task_id) DO UPDATE SET role = EXCLUDED.role",
            )
            .bind(user_id)
            .bind(task_id)
            .bind(role.as_str())
        };

        query
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("set_role", e))
    }

    async fn remove_all_for_task(&self, task_id: TaskId) -> Result<(), RoleStoreError> {
        sqlx::query("DELETE FROM task_roles WHERE task_id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("remove_all_for_task", e))
    }

    async fn roles_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<RoleAssignment>, RoleStoreError> {
        let rows = sqlx::query_as::<_, (UserId, String)>(
            "SELECT user_id, role FROM task_roles WHERE task_id = $1 ORDER BY user_id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("roles_for_task", e))?;

        rows.into_iter()
            .map(|(user_id, raw)| {
                Ok(RoleAssignment {
                    user_id,
                    task_id,
                    role: parse_role(&raw)?,
                })
            })
            .collect()
    }
}
