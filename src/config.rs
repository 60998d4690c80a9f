use std::env;
use std::time::Duration;

use crate::auth::token::DEFAULT_TOKEN_TTL_SECS;
use crate::error::AppError;

const DEFAULT_ROLE_STORE_TIMEOUT_MS: u64 = 250;

/// Process-wide settings, read once at startup.
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: i64,
    /// Upper bound for a single role store call before it counts as unavailable.
    pub role_store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AppError::InternalServerError(format!("{} must be set", key)))
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            token_ttl_secs: at_least_one(
                "TOKEN_TTL_SECS",
                parse_or(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            )?,
            role_store_timeout: Duration::from_millis(at_least_one(
                "ROLE_STORE_TIMEOUT_MS",
                parse_or(&lookup, "ROLE_STORE_TIMEOUT_MS", DEFAULT_ROLE_STORE_TIMEOUT_MS)?,
            )?),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{} must be a number", key))),
        None => Ok(default),
    }
}

/// A zero TTL or timeout would reject every request.
fn at_least_one<T>(key: &str, value: T) -> Result<T, AppError>
where
    T: PartialOrd + From<u8>,
{
    if value < T::from(1) {
        return Err(AppError::InternalServerError(format!(
            "{} must be at least 1",
            key
        )));
    }
    Ok(value)
}
