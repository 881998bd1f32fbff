//! Registration and login.

use axum::{extract::State, http::StatusCode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::extract::Json;
use crate::api::account::{insert_address, upsert_billing, AddressInput, BillingInput};
use crate::api::non_blank;
use crate::auth::{hash_password_blocking, issue_token, verify_password_blocking, Role};
use crate::error::{is_unique_violation, Result, StoreError};
use crate::models::UserRow;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    pub last_name: Option<String>,
    pub tax_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub wants_invoice: bool,
    pub address: Option<AddressInput>,
    pub billing: Option<BillingInput>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest { pub email: String, pub password: String }

#[derive(Debug, Serialize)]
pub struct AuthResponse { pub user: UserRow, pub token: String }

pub async fn register(State(s): State<AppState>, Json(r): Json<RegisterRequest>) -> Result<(StatusCode, Json<AuthResponse>)> {
    r.validate()?;
    if let Some(address) = &r.address { address.validate()?; }
    if let Some(billing) = &r.billing { billing.validate()?; }
    if r.wants_invoice && r.billing.is_none() {
        return Err(StoreError::Validation("billing details are required when invoices are requested".into()));
    }

    let email = r.email.trim().to_lowercase();
    let hash = hash_password_blocking(r.password.clone()).await?;

    let mut tx = s.db.begin().await?;
    let user = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, first_name, last_name, tax_id, birth_date, email, phone, password_hash, wants_invoice, role) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'customer') RETURNING *")
        .bind(Uuid::now_v7()).bind(r.first_name.trim()).bind(non_blank(r.last_name.clone())).bind(non_blank(r.tax_id.clone()))
        .bind(r.birth_date).bind(&email).bind(non_blank(r.phone.clone())).bind(&hash).bind(r.wants_invoice)
        .fetch_one(&mut *tx).await
        .map_err(|e| if is_unique_violation(&e) { StoreError::Conflict("email already registered".into()) } else { e.into() })?;

    if let (true, Some(billing)) = (r.wants_invoice, &r.billing) {
        upsert_billing(&mut *tx, user.id, billing).await?;
    }
    if let Some(address) = &r.address {
        insert_address(&mut *tx, user.id, address).await?;
    }
    tx.commit().await?;

    let token = issue_token(user.id, Role::Customer, &s.config)?;
    tracing::info!(user_id = %user.id, "account registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> Result<Json<AuthResponse>> {
    let email = r.email.trim().to_lowercase();
    if email.is_empty() || r.password.is_empty() {
        return Err(StoreError::Validation("email and password are required".into()));
    }

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
        .bind(&email).fetch_optional(&s.db).await?
        .ok_or(StoreError::BadCredentials)?;
    if !verify_password_blocking(r.password, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "failed login");
        return Err(StoreError::BadCredentials);
    }

    let user = sqlx::query_as::<_, UserRow>("UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING *")
        .bind(user.id).fetch_one(&s.db).await?;
    let role: Role = user.role.parse()?;
    let token = issue_token(user.id, role, &s.config)?;
    Ok(Json(AuthResponse { user, token }))
}
