use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use dotenv::dotenv;
use serde_json::json;
use sqlx::PgPool;

use taskguard::auth::{AuthResponse, GateMiddleware, PrincipalResolver, TokenCodec};
use taskguard::authz::{
    DecisionEngine, PgResourceLoader, PgRoleStore, RequestGate, ResourceLoader, Role,
    RoleAssignment, RoleStore,
};
use taskguard::models::{Comment, Task, TaskPriority, TaskStatus};
use taskguard::routes::{self, health};

struct TestUser {
    id: i32,
    token: String,
}

impl TestUser {
    fn bearer(&self) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", self.token))
    }
}

async fn register_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
    username: &str,
) -> TestUser {
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(&json!({
            "username": username,
            "email": email,
            "password": "Password123!"
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED, "register {}", email);
    let auth: AuthResponse = test::read_body_json(resp).await;
    TestUser {
        id: auth.user_id,
        token: auth.token,
    }
}

async fn cleanup_user(pool: &PgPool, email: &str) {
    let _ = sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await;
}

async fn connect() -> PgPool {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

macro_rules! app {
    ($pool:expr) => {{
        let codec = Arc::new(TokenCodec::new(b"tasks_integration_secret", 3600));
        let roles: Arc<dyn RoleStore> = Arc::new(PgRoleStore::new($pool.clone()));
        let loader: Arc<dyn ResourceLoader> = Arc::new(PgResourceLoader::new($pool.clone()));
        let gate = Arc::new(RequestGate::new(
            PrincipalResolver::new(codec.clone()),
            DecisionEngine::new(roles.clone()),
            loader,
        ));
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::from(codec))
                .app_data(web::Data::from(roles))
                .wrap(Logger::default())
                .service(health::health)
                .service(
                    web::scope("/api")
                        .wrap(GateMiddleware::new(gate))
                        .configure(routes::config),
                ),
        )
        .await
    }};
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_task_crud_flow() {
    let pool = connect().await;
    let app = app!(pool);

    let email = "crud_user@example.com";
    cleanup_user(&pool, email).await;
    let owner = register_user(&app, email, "crud_user").await;

    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .append_header(owner.bearer())
        .set_json(&json!({
            "title": "CRUD Task",
            "description": "Initial description",
            "priority": TaskPriority::Medium
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Task = test::read_body_json(resp).await;
    assert_eq!(created.status, TaskStatus::Pending);
    assert_eq!(created.owner_id, owner.id);

    // The creator is recorded as owner.
    let roles = PgRoleStore::new(pool.clone());
    assert_eq!(roles.get_role(owner.id, created.id).await.unwrap(), Role::Owner);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tasks/{}", created.id))
        .append_header(owner.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Task = test::read_body_json(resp).await;
    assert_eq!(fetched.title, "CRUD Task");

    let req = test::TestRequest::put()
        .uri(&format!("/api/tasks/{}", created.id))
        .append_header(owner.bearer())
        .set_json(&json!({
            "title": "CRUD Task Updated",
            "status": TaskStatus::InProgress,
            "priority": TaskPriority::High
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Task = test::read_body_json(resp).await;
    assert_eq!(updated.title, "CRUD Task Updated");
    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.priority, Some(TaskPriority::High));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/tasks/{}", created.id))
        .append_header(owner.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    // Deleting the task removed every role on it.
    assert!(roles.roles_for_task(created.id).await.unwrap().is_empty());

    let req = test::TestRequest::get()
        .uri(&format!("/api/tasks/{}", created.id))
        .append_header(owner.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_roles_govern_task_and_comment_access() {
    let pool = connect().await;
    let app = app!(pool);

    let emails = [
        "roles_owner@example.com",
        "roles_collab@example.com",
        "roles_viewer@example.com",
        "roles_outsider@example.com",
    ];
    for email in emails {
        cleanup_user(&pool, email).await;
    }
    let owner = register_user(&app, emails[0], "roles_owner").await;
    let collaborator = register_user(&app, emails[1], "roles_collab").await;
    let viewer = register_user(&app, emails[2], "roles_viewer").await;
    let outsider = register_user(&app, emails[3], "roles_outsider").await;

    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .append_header(owner.bearer())
        .set_json(&json!({ "title": "Shared Task" }))
        .to_request();
    let task: Task = test::read_body_json(test::call_service(&app, req).await).await;

    for (user, role) in [(&collaborator, "collaborator"), (&viewer, "viewer")] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/{}/roles/{}", task.id, user.id))
            .append_header(owner.bearer())
            .set_json(&json!({ "role": role }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    // Ownership cannot be handed out, and the owner cannot be demoted.
    let req = test::TestRequest::put()
        .uri(&format!("/api/tasks/{}/roles/{}", task.id, outsider.id))
        .append_header(owner.bearer())
        .set_json(&json!({ "role": "owner" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
    let req = test::TestRequest::delete()
        .uri(&format!("/api/tasks/{}/roles/{}", task.id, owner.id))
        .append_header(owner.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    // Only the owner manages access.
    let req = test::TestRequest::put()
        .uri(&format!("/api/tasks/{}/roles/{}", task.id, outsider.id))
        .append_header(collaborator.bearer())
        .set_json(&json!({ "role": "viewer" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/tasks/{}/roles", task.id))
        .append_header(viewer.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: Vec<RoleAssignment> = test::read_body_json(resp).await;
    assert_eq!(listed.len(), 3);

    // Viewer reads but cannot edit; outsider gets nothing.
    let task_uri = format!("/api/tasks/{}", task.id);
    let req = test::TestRequest::get()
        .uri(&task_uri)
        .append_header(viewer.bearer())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let req = test::TestRequest::put()
        .uri(&task_uri)
        .append_header(viewer.bearer())
        .set_json(&json!({ "title": "Viewer edit" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
    let req = test::TestRequest::get()
        .uri(&task_uri)
        .append_header(outsider.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    // Collaborator comments; viewer cannot; collaborator cannot delete.
    let comments_uri = format!("/api/tasks/{}/comments", task.id);
    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .append_header(collaborator.bearer())
        .set_json(&json!({ "body": "Working on it" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment: Comment = test::read_body_json(resp).await;
    assert_eq!(comment.author_id, collaborator.id);

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .append_header(viewer.bearer())
        .set_json(&json!({ "body": "Me too" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::get()
        .uri(&comments_uri)
        .append_header(viewer.bearer())
        .to_request();
    let comments: Vec<Comment> = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(comments.len(), 1);

    let comment_uri = format!("{}/{}", comments_uri, comment.id);
    let req = test::TestRequest::delete()
        .uri(&comment_uri)
        .append_header(collaborator.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
    let req = test::TestRequest::delete()
        .uri(&comment_uri)
        .append_header(owner.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    // Revoked access takes effect on the next request.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/tasks/{}/roles/{}", task.id, viewer.id))
        .append_header(owner.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
    let req = test::TestRequest::get()
        .uri(&task_uri)
        .append_header(viewer.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::delete()
        .uri(&task_uri)
        .append_header(owner.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    for email in emails {
        cleanup_user(&pool, email).await;
    }
}
