//! Social network links listed in the storefront footer.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::extract::{Json, Path};
use crate::auth::AdminUser;
use crate::error::{Result, StoreError};
use crate::models::SocialLink;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SocialLinkInput {
    #[validate(url)]
    pub url: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub title: String,
}

pub async fn list_links(State(s): State<AppState>) -> Result<Json<Vec<SocialLink>>> {
    let rows = sqlx::query_as::<_, SocialLink>("SELECT * FROM social_links ORDER BY created_at DESC").fetch_all(&s.db).await?;
    Ok(Json(rows))
}

pub async fn create_link(State(s): State<AppState>, AdminUser(_): AdminUser, Json(r): Json<SocialLinkInput>) -> Result<(StatusCode, Json<SocialLink>)> {
    r.validate()?;
    let link = sqlx::query_as::<_, SocialLink>("INSERT INTO social_links (id, url, title, created_at) VALUES ($1, $2, $3, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.url.trim()).bind(r.title.trim()).fetch_one(&s.db).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn delete_link(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let res = sqlx::query("DELETE FROM social_links WHERE id = $1").bind(id).execute(&s.db).await?;
    if res.rows_affected() == 0 { return Err(StoreError::NotFound("social link")); }
    Ok(StatusCode::NO_CONTENT)
}
