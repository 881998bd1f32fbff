//! Bearer-token authentication and password hashing.
//!
//! Tokens are HS256 JWTs whose subject is the account id rendered as an
//! opaque string. Admin access needs the `admin` role both in the token and
//! on the stored account, so a demotion takes effect before the token expires.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{async_trait, extract::FromRequestParts, http::{header, request::Parts, HeaderMap}};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Customer, Admin }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Admin => "admin" }
    }
}

impl FromStr for Role {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(StoreError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(user_id: Uuid, role: Role, config: &Config) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.jwt_secret.as_bytes()))
        .map_err(|e| StoreError::Internal(format!("token encoding failed: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            StoreError::Unauthorized
        })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| StoreError::Internal(format!("salt encoding failed: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StoreError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Runs Argon2 hashing off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))
}

/// Any authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser { pub id: Uuid, pub role: Role }

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or(StoreError::Unauthorized)?;
        let claims = verify_token(token, &state.config.jwt_secret)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| StoreError::Unauthorized)?;
        Ok(Self { id, role: claims.role })
    }
}

/// An account holding the admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(StoreError::Forbidden("administrator role required".into()));
        }
        let stored: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = $1")
            .bind(user.id).fetch_optional(&state.db).await?;
        match stored {
            Some((role,)) if role == Role::Admin.as_str() => Ok(Self(user)),
            _ => {
                tracing::warn!(user_id = %user.id, "admin token presented by a non-admin account");
                Err(StoreError::Forbidden("administrator role required".into()))
            }
        }
    }
}

/// Creates or promotes the configured admin account.
pub async fn bootstrap_admin(db: &PgPool, config: &Config) -> Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else { return Ok(()) };
    let hash = hash_password_blocking(password.clone()).await?;
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, first_name, email, password_hash, role) VALUES ($1, 'Admin', $2, $3, 'admin') \
         ON CONFLICT (email) DO UPDATE SET role = 'admin' RETURNING id")
        .bind(Uuid::now_v7()).bind(email).bind(&hash)
        .fetch_one(db).await?;
    tracing::info!(user_id = %id, email = %email, "admin account ready");
    Ok(())
}
