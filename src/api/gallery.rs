//! Photo gallery shown on the storefront.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::extract::{Json, Path};
use crate::api::{non_blank, uploads};
use crate::auth::AdminUser;
use crate::error::{Result, StoreError};
use crate::models::GalleryImage;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct GalleryInput {
    #[validate(length(min = 1, max = 500), custom = "image_location")]
    pub image_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// An absolute http(s) url or a file previously stored under `/uploads/`.
fn image_location(url: &str) -> std::result::Result<(), ValidationError> {
    let url = url.trim();
    let local = uploads::local_path(std::path::Path::new("."), url).is_some();
    let remote = (url.starts_with("https://") || url.starts_with("http://")) && validator::validate_url(url);
    if local || remote { Ok(()) } else { Err(ValidationError::new("image_url")) }
}

pub async fn list_images(State(s): State<AppState>) -> Result<Json<Vec<GalleryImage>>> {
    let rows = sqlx::query_as::<_, GalleryImage>("SELECT * FROM gallery_images ORDER BY created_at DESC").fetch_all(&s.db).await?;
    Ok(Json(rows))
}

pub async fn create_image(State(s): State<AppState>, AdminUser(_): AdminUser, Json(r): Json<GalleryInput>) -> Result<(StatusCode, Json<GalleryImage>)> {
    r.validate()?;
    let image = sqlx::query_as::<_, GalleryImage>(
        "INSERT INTO gallery_images (id, title, description, image_url, category, created_at) VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(non_blank(r.title)).bind(non_blank(r.description)).bind(r.image_url.trim()).bind(non_blank(r.category))
        .fetch_one(&s.db).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// Removes the row and, for uploaded images, the file on disk.
pub async fn delete_image(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let (url,): (String,) = sqlx::query_as("DELETE FROM gallery_images WHERE id = $1 RETURNING image_url")
        .bind(id).fetch_optional(&s.db).await?.ok_or(StoreError::NotFound("gallery image"))?;
    uploads::remove_local_image(&s.config.upload_dir, &url).await;
    Ok(StatusCode::NO_CONTENT)
}
