//! Self-service account endpoints: profile, password, addresses, billing profile.
//!
//! Every query here is scoped to the token subject.

use axum::{extract::State, http::StatusCode};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Executor, Postgres};
use uuid::Uuid;
use validator::Validate;

use crate::api::extract::{Json, Path};
use crate::api::non_blank;
use crate::auth::{hash_password_blocking, verify_password_blocking, AuthUser};
use crate::error::{Result, StoreError};
use crate::models::{AddressRow, BillingProfileRow, UserRow};
use crate::AppState;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 100))]
    pub region: String,
    #[validate(length(min = 1, max = 100))]
    pub commune: String,
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 20))]
    pub street_number: String,
    pub unit: Option<String>,
    pub recipient_first_name: Option<String>,
    pub recipient_last_name: Option<String>,
    pub recipient_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BillingInput {
    #[validate(length(min = 1, max = 100))]
    pub business_name: String,
    #[validate(length(min = 1, max = 20))]
    pub tax_id: String,
    #[validate(length(min = 1, max = 40))]
    pub business_activity: String,
    #[validate(length(min = 1, max = 30))]
    pub phone: String,
    #[validate(length(min = 1, max = 100))]
    pub region: String,
    #[validate(length(min = 1, max = 100))]
    pub commune: String,
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 20))]
    pub street_number: String,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    pub last_name: Option<String>,
    pub tax_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    #[serde(default)]
    pub wants_invoice: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordChange {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

pub(crate) async fn insert_address<'e, E: Executor<'e, Database = Postgres>>(db: E, user_id: Uuid, a: &AddressInput) -> Result<AddressRow> {
    let row = sqlx::query_as::<_, AddressRow>(
        "INSERT INTO addresses (id, user_id, region, commune, street, street_number, unit, recipient_first_name, recipient_last_name, recipient_phone) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *")
        .bind(Uuid::now_v7()).bind(user_id).bind(a.region.trim()).bind(a.commune.trim()).bind(a.street.trim()).bind(a.street_number.trim())
        .bind(non_blank(a.unit.clone())).bind(non_blank(a.recipient_first_name.clone()))
        .bind(non_blank(a.recipient_last_name.clone())).bind(non_blank(a.recipient_phone.clone()))
        .fetch_one(db).await?;
    Ok(row)
}

pub(crate) async fn upsert_billing<'e, E: Executor<'e, Database = Postgres>>(db: E, user_id: Uuid, b: &BillingInput) -> Result<BillingProfileRow> {
    let row = sqlx::query_as::<_, BillingProfileRow>(
        "INSERT INTO billing_profiles (user_id, business_name, tax_id, business_activity, phone, region, commune, street, street_number, unit, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW()) \
         ON CONFLICT (user_id) DO UPDATE SET business_name = $2, tax_id = $3, business_activity = $4, phone = $5, \
         region = $6, commune = $7, street = $8, street_number = $9, unit = $10, updated_at = NOW() RETURNING *")
        .bind(user_id).bind(b.business_name.trim()).bind(b.tax_id.trim()).bind(b.business_activity.trim()).bind(b.phone.trim())
        .bind(b.region.trim()).bind(b.commune.trim()).bind(b.street.trim()).bind(b.street_number.trim()).bind(non_blank(b.unit.clone()))
        .fetch_one(db).await?;
    Ok(row)
}

pub async fn get_profile(State(s): State<AppState>, user: AuthUser) -> Result<Json<UserRow>> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(user.id).fetch_optional(&s.db).await?
        .map(Json).ok_or(StoreError::NotFound("user"))
}

pub async fn update_profile(State(s): State<AppState>, user: AuthUser, Json(r): Json<ProfileUpdate>) -> Result<Json<UserRow>> {
    r.validate()?;
    sqlx::query_as::<_, UserRow>(
        "UPDATE users SET first_name = $2, last_name = $3, tax_id = $4, birth_date = $5, phone = $6, wants_invoice = $7 WHERE id = $1 RETURNING *")
        .bind(user.id).bind(r.first_name.trim()).bind(non_blank(r.last_name)).bind(non_blank(r.tax_id)).bind(r.birth_date)
        .bind(non_blank(r.phone)).bind(r.wants_invoice)
        .fetch_optional(&s.db).await?.map(Json).ok_or(StoreError::NotFound("user"))
}

pub async fn change_password(State(s): State<AppState>, user: AuthUser, Json(r): Json<PasswordChange>) -> Result<StatusCode> {
    r.validate()?;
    let (hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
        .bind(user.id).fetch_optional(&s.db).await?.ok_or(StoreError::NotFound("user"))?;
    if !verify_password_blocking(r.current_password, hash).await? {
        return Err(StoreError::BadCredentials);
    }
    let new_hash = hash_password_blocking(r.new_password).await?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1").bind(user.id).bind(&new_hash).execute(&s.db).await?;
    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_addresses(State(s): State<AppState>, user: AuthUser) -> Result<Json<Vec<AddressRow>>> {
    let rows = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at, id")
        .bind(user.id).fetch_all(&s.db).await?;
    Ok(Json(rows))
}

pub async fn create_address(State(s): State<AppState>, user: AuthUser, Json(r): Json<AddressInput>) -> Result<(StatusCode, Json<AddressRow>)> {
    r.validate()?;
    let row = insert_address(&s.db, user.id, &r).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Editing an address leaves snapshots on already-placed orders untouched.
pub async fn update_address(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, Json(r): Json<AddressInput>) -> Result<Json<AddressRow>> {
    r.validate()?;
    sqlx::query_as::<_, AddressRow>(
        "UPDATE addresses SET region = $3, commune = $4, street = $5, street_number = $6, unit = $7, \
         recipient_first_name = $8, recipient_last_name = $9, recipient_phone = $10 WHERE id = $1 AND user_id = $2 RETURNING *")
        .bind(id).bind(user.id).bind(r.region.trim()).bind(r.commune.trim()).bind(r.street.trim()).bind(r.street_number.trim())
        .bind(non_blank(r.unit)).bind(non_blank(r.recipient_first_name)).bind(non_blank(r.recipient_last_name)).bind(non_blank(r.recipient_phone))
        .fetch_optional(&s.db).await?.map(Json).ok_or(StoreError::NotFound("address"))
}

pub async fn delete_address(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let res = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2").bind(id).bind(user.id).execute(&s.db).await?;
    if res.rows_affected() == 0 { return Err(StoreError::NotFound("address")); }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_billing(State(s): State<AppState>, user: AuthUser) -> Result<Json<BillingProfileRow>> {
    sqlx::query_as::<_, BillingProfileRow>("SELECT * FROM billing_profiles WHERE user_id = $1").bind(user.id).fetch_optional(&s.db).await?
        .map(Json).ok_or(StoreError::NotFound("billing profile"))
}

pub async fn put_billing(State(s): State<AppState>, user: AuthUser, Json(r): Json<BillingInput>) -> Result<Json<BillingProfileRow>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let row = upsert_billing(&mut *tx, user.id, &r).await?;
    sqlx::query("UPDATE users SET wants_invoice = TRUE WHERE id = $1").bind(user.id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Json(row))
}

pub async fn delete_billing(State(s): State<AppState>, user: AuthUser) -> Result<StatusCode> {
    let mut tx = s.db.begin().await?;
    let res = sqlx::query("DELETE FROM billing_profiles WHERE user_id = $1").bind(user.id).execute(&mut *tx).await?;
    if res.rows_affected() == 0 { return Err(StoreError::NotFound("billing profile")); }
    sqlx::query("UPDATE users SET wants_invoice = FALSE WHERE id = $1").bind(user.id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
