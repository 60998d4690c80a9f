use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::UserId;

/// Public view of a registered user.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Row read at sign-in; never serialized.
#[derive(Debug, FromRow)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}
