pub mod auth;
pub mod comments;
pub mod health;
pub mod tasks;

use actix_web::web;

/// Routes served under the gated `/api` scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::register),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task)
            .service(tasks::list_roles)
            .service(tasks::grant_role)
            .service(tasks::revoke_role)
            .service(comments::list_comments)
            .service(comments::create_comment)
            .service(comments::get_comment)
            .service(comments::update_comment)
            .service(comments::delete_comment),
    );
}
