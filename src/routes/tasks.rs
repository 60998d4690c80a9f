use crate::{
    auth::{AuthenticatedPrincipal, AuthorizedResource},
    authz::{ResourceRef, Role, RoleStore},
    error::AppError,
    models::{Task, TaskInput, UserId},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const TASK_COLUMNS: &str =
    "id, title, description, priority, status, created_at, updated_at, owner_id";

/// Body of a role grant.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
}

/// Creates a new task and records the caller as its owner.
///
/// The owner role is written only after the row exists. If that write fails
/// the row is removed again so no task is left that nobody can manage.
///
/// ## Responses:
/// - `201 Created`: The new `Task`.
/// - `422 Unprocessable Entity`: `TaskInput` failed validation.
/// - `500 Internal Server Error`: The task or its owner role could not be stored.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    roles: web::Data<dyn RoleStore>,
    principal: AuthenticatedPrincipal,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let user_id = principal.0.user_id;
    let task = Task::new(task_data.into_inner(), user_id);

    let created = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, title, description, priority, status, owner_id)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.priority)
    .bind(&task.status)
    .bind(task.owner_id)
    .fetch_one(&**pool)
    .await?;

    if let Err(e) = roles.set_role(user_id, created.id, Role::Owner).await {
        error!("failed to record owner of task {}: {}", created.id, e);
        return Err(discard_unowned_task(&pool, created.id).await);
    }

    info!("user {} created task {}", user_id, created.id);
    Ok(HttpResponse::Created().json(created))
}

/// Removes a task whose owner could not be recorded.
///
/// Always yields the `500` for the caller; a failed removal is only logged.
async fn discard_unowned_task(pool: &PgPool, task_id: Uuid) -> AppError {
    if let Err(e) = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(pool)
        .await
    {
        error!("task {} has no owner and could not be removed: {}", task_id, e);
    }
    AppError::InternalServerError("Failed to record task owner".into())
}

/// Retrieves a task by id.
///
/// Reaching this handler means the caller holds at least `viewer` on the task.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE id = $1",
        TASK_COLUMNS
    ))
    .bind(task_id.into_inner())
    .fetch_optional(&**pool)
    .await?;

    task.map(|task| HttpResponse::Ok().json(task))
        .ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// Updates a task. A missing `status` keeps the current one.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let updated = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks
         SET title = $1, description = $2, priority = $3,
             status = COALESCE($4, status), updated_at = NOW()
         WHERE id = $5
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(&task_data.title)
    .bind(&task_data.description)
    .bind(&task_data.priority)
    .bind(&task_data.status)
    .bind(task_id.into_inner())
    .fetch_optional(&**pool)
    .await?;

    updated
        .map(|task| HttpResponse::Ok().json(task))
        .ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// Deletes a task, its comments, and every role assignment on it.
///
/// The task row is the source of truth: once it is gone the task is gone,
/// even if clearing the role store fails. Leftover assignments point at a
/// task that no longer resolves and are never consulted; they are swept by
/// `PgRoleStore::purge_orphans` at startup.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    roles: web::Data<dyn RoleStore>,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task_id = task_id.into_inner();

    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }

    if let Err(e) = roles.remove_all_for_task(task_id).await {
        error!("task {} deleted but its roles were not cleared: {}", task_id, e);
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Lists every role assignment on a task.
#[get("/{id}/roles")]
pub async fn list_roles(
    roles: web::Data<dyn RoleStore>,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let assignments = roles.roles_for_task(task_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(assignments))
}

fn task_owner(authorized: &AuthorizedResource) -> Option<UserId> {
    match authorized.0.resource {
        ResourceRef::Task { owner_id, .. } => owner_id,
        ResourceRef::Comment { .. } => None,
    }
}

/// Grants `collaborator`, `viewer`, or `none` to a user on a task.
///
/// Ownership is not transferable, and the owner's own role cannot be changed.
#[put("/{id}/roles/{user_id}")]
pub async fn grant_role(
    roles: web::Data<dyn RoleStore>,
    authorized: AuthorizedResource,
    path: web::Path<(Uuid, UserId)>,
    grant: web::Json<RoleGrant>,
) -> Result<impl Responder, AppError> {
    let (task_id, user_id) = path.into_inner();

    if grant.role == Role::Owner {
        return Err(AppError::BadRequest("Ownership cannot be granted".into()));
    }
    if task_owner(&authorized) == Some(user_id) {
        return Err(AppError::BadRequest(
            "The task owner's role cannot be changed".into(),
        ));
    }

    roles.set_role(user_id, task_id, grant.role).await?;
    info!(
        "user {} set role {} for user {} on task {}",
        authorized.0.principal.user_id, grant.role, user_id, task_id
    );

    Ok(HttpResponse::Ok().json(RoleGrant { role: grant.role }))
}

/// Removes whatever role a user holds on a task.
#[delete("/{id}/roles/{user_id}")]
pub async fn revoke_role(
    roles: web::Data<dyn RoleStore>,
    authorized: AuthorizedResource,
    path: web::Path<(Uuid, UserId)>,
) -> Result<impl Responder, AppError> {
    let (task_id, user_id) = path.into_inner();

    if task_owner(&authorized) == Some(user_id) {
        return Err(AppError::BadRequest(
            "The task owner's role cannot be revoked".into(),
        ));
    }

    roles.set_role(user_id, task_id, Role::None).await?;
    info!(
        "user {} revoked role of user {} on task {}",
        authorized.0.principal.user_id, user_id, task_id
    );

    Ok(HttpResponse::NoContent().finish())
}
