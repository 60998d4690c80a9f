use crate::{
    auth::{hash_password, verify_password, AuthResponse, LoginRequest, RegisterRequest, TokenCodec},
    error::AppError,
    models::{User, UserCredentials, UserId},
};
use actix_web::{post, web, HttpResponse, Responder};
use chrono::Utc;
use log::info;
use sqlx::PgPool;
use validator::Validate;

/// Register a new user
///
/// Creates the account and returns a token for it.
///
/// ## Responses:
/// - `201 Created`: `AuthResponse` with a fresh token.
/// - `400 Bad Request`: The email or username is already taken.
/// - `422 Unprocessable Entity`: The payload failed validation.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    codec: web::Data<TokenCodec>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let existing_user = sqlx::query_scalar::<_, UserId>(
        "SELECT id FROM users WHERE email = $1 OR username = $2",
    )
    .bind(&register_data.email)
    .bind(&register_data.username)
    .fetch_optional(&**pool)
    .await?;

    if existing_user.is_some() {
        return Err(AppError::BadRequest(
            "Email or username already registered".into(),
        ));
    }

    let password_hash = hash_password(&register_data.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3)
         RETURNING id, username, email, created_at",
    )
    .bind(&register_data.username)
    .bind(&register_data.email)
    .bind(password_hash)
    .fetch_one(&**pool)
    .await?;

    let token = codec.sign(user.id, &user.username, Utc::now().timestamp())?;
    info!("registered user {}", user.id);

    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        user_id: user.id,
    }))
}

/// Login user
///
/// Checks the password and returns a token. Unknown email and wrong password
/// are indistinguishable to the caller.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    codec: web::Data<TokenCodec>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, username, password_hash FROM users WHERE email = $1",
    )
    .bind(&login_data.email)
    .fetch_optional(&**pool)
    .await?;

    match user {
        Some(user) if verify_password(&login_data.password, &user.password_hash)? => {
            let token = codec.sign(user.id, &user.username, Utc::now().timestamp())?;
            Ok(HttpResponse::Ok().json(AuthResponse {
                token,
                user_id: user.id,
            }))
        }
        _ => Err(AppError::Unauthorized("Invalid credentials".into())),
    }
}
