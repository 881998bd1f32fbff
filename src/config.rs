//! Runtime configuration read from the environment (and `.env`, via `dotenvy`).

use std::path::PathBuf;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "horizonte-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub currency: String,
    pub nats_url: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let production = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            port: parse_or(get("PORT"), "PORT", 8083)?,
            jwt_secret,
            token_ttl_hours: parse_or(get("TOKEN_TTL_HOURS"), "TOKEN_TTL_HOURS", 24 * 7)?,
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("public/uploads")),
            max_upload_bytes: parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            currency: get("CURRENCY").unwrap_or_else(|| "CLP".to_string()).to_uppercase(),
            nats_url: get("NATS_URL"),
            admin_email: get("ADMIN_EMAIL").map(|e| e.to_lowercase()),
            admin_password: get("ADMIN_PASSWORD"),
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
