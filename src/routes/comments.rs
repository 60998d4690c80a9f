//! Comment endpoints nested under `/tasks/{id}/comments`.
//!
//! The gate has already checked the caller's role on the parent task and
//! confirmed that an addressed comment belongs to it.

use crate::{
    auth::AuthenticatedPrincipal,
    error::AppError,
    models::{Comment, CommentInput},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const COMMENT_COLUMNS: &str = "id, task_id, author_id, body, created_at";

#[get("/{id}/comments")]
pub async fn list_comments(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let comments = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {} FROM comments WHERE task_id = $1 ORDER BY created_at",
        COMMENT_COLUMNS
    ))
    .bind(task_id.into_inner())
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(comments))
}

#[post("/{id}/comments")]
pub async fn create_comment(
    pool: web::Data<PgPool>,
    principal: AuthenticatedPrincipal,
    task_id: web::Path<Uuid>,
    comment_data: web::Json<CommentInput>,
) -> Result<impl Responder, AppError> {
    comment_data.validate()?;

    let comment = Comment::new(
        comment_data.into_inner(),
        task_id.into_inner(),
        principal.0.user_id,
    );

    let created = sqlx::query_as::<_, Comment>(&format!(
        "INSERT INTO comments (id, task_id, author_id, body)
         VALUES ($1, $2, $3, $4)
         RETURNING {}",
        COMMENT_COLUMNS
    ))
    .bind(comment.id)
    .bind(comment.task_id)
    .bind(comment.author_id)
    .bind(&comment.body)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(created))
}

#[get("/{id}/comments/{comment_id}")]
pub async fn get_comment(
    pool: web::Data<PgPool>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<impl Responder, AppError> {
    let (task_id, comment_id) = path.into_inner();

    let comment = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {} FROM comments WHERE id = $1 AND task_id = $2",
        COMMENT_COLUMNS
    ))
    .bind(comment_id)
    .bind(task_id)
    .fetch_optional(&**pool)
    .await?;

    comment
        .map(|comment| HttpResponse::Ok().json(comment))
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))
}

/// Edits a comment. Any collaborator on the task may edit, not only the author.
#[put("/{id}/comments/{comment_id}")]
pub async fn update_comment(
    pool: web::Data<PgPool>,
    path: web::Path<(Uuid, Uuid)>,
    comment_data: web::Json<CommentInput>,
) -> Result<impl Responder, AppError> {
    comment_data.validate()?;
    let (task_id, comment_id) = path.into_inner();

    let updated = sqlx::query_as::<_, Comment>(&format!(
        "UPDATE comments SET body = $1 WHERE id = $2 AND task_id = $3 RETURNING {}",
        COMMENT_COLUMNS
    ))
    .bind(&comment_data.body)
    .bind(comment_id)
    .bind(task_id)
    .fetch_optional(&**pool)
    .await?;

    updated
        .map(|comment| HttpResponse::Ok().json(comment))
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))
}

#[delete("/{id}/comments/{comment_id}")]
pub async fn delete_comment(
    pool: web::Data<PgPool>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<impl Responder, AppError> {
    let (task_id, comment_id) = path.into_inner();

    let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND task_id = $2")
        .bind(comment_id)
        .bind(task_id)
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Comment not found".into()));
    }

    Ok(HttpResponse::NoContent().finish())
}
