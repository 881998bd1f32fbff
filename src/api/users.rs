//! Admin view of customer accounts.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{Json, Path, Query};
use crate::api::{like_pattern, non_blank, ListParams, PaginatedResponse};
use crate::auth::{AdminUser, Role};
use crate::error::{Result, StoreError};
use crate::models::UserRow;
use crate::AppState;

#[derive(Debug, Deserialize)] pub struct RoleUpdate { pub role: String }

/// Newest accounts first; `search` matches name or email.
pub async fn list_users(State(s): State<AppState>, AdminUser(_): AdminUser, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<UserRow>>> {
    let (page, per_page, offset) = p.window();
    let search = non_blank(p.search.clone()).map(|q| like_pattern(&q));
    let filter = "($1::text IS NULL OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1)";

    let data = sqlx::query_as::<_, UserRow>(&format!("SELECT * FROM users WHERE {filter} ORDER BY created_at DESC LIMIT $2 OFFSET $3"))
        .bind(&search).bind(per_page as i64).bind(offset).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
        .bind(&search).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse { data, total: total.0, page, per_page }))
}

pub async fn set_role(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<RoleUpdate>) -> Result<Json<UserRow>> {
    let role: Role = r.role.trim().parse()?;
    if id == admin.id && role != Role::Admin {
        return Err(StoreError::Conflict("administrators cannot remove their own role".into()));
    }
    let user = sqlx::query_as::<_, UserRow>("UPDATE users SET role = $2 WHERE id = $1 RETURNING *")
        .bind(id).bind(role.as_str()).fetch_optional(&s.db).await?
        .ok_or(StoreError::NotFound("user"))?;
    tracing::info!(user_id = %id, role = role.as_str(), admin_id = %admin.id, "role changed");
    Ok(Json(user))
}

/// Removes an account with its addresses and billing profile. Its orders stay
/// in history without an owner.
pub async fn delete_user(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if id == admin.id {
        return Err(StoreError::Conflict("administrators cannot delete their own account".into()));
    }
    let res = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&s.db).await?;
    if res.rows_affected() == 0 { return Err(StoreError::NotFound("user")); }
    tracing::info!(user_id = %id, admin_id = %admin.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
