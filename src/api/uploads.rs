//! Image uploads stored on local disk and served under `/uploads`.

use axum::{extract::{Multipart, State}, http::StatusCode};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;

use crate::api::extract::Json;
use crate::auth::AdminUser;
use crate::error::{Result, StoreError};
use crate::AppState;

const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(Debug, Serialize)] pub struct UploadResponse { pub url: String }

/// Stores the first file field of the form. Only `image/*` content is accepted.
pub async fn upload_image(State(s): State<AppState>, AdminUser(admin): AdminUser, mut multipart: Multipart) -> Result<(StatusCode, Json<UploadResponse>)> {
    let limit = s.config.max_upload_bytes;
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE { StoreError::PayloadTooLarge(limit) } else { StoreError::Validation(e.body_text()) }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(original) = field.file_name().map(str::to_string) else { continue };
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(StoreError::Validation(format!("only image uploads are accepted, got '{content_type}'")));
        }
        let data = field.bytes().await.map_err(multipart_error)?;
        if data.is_empty() { return Err(StoreError::Validation("uploaded file is empty".into())); }
        if data.len() > limit { return Err(StoreError::PayloadTooLarge(limit)); }

        let name = stored_file_name(&original, Utc::now().timestamp_millis());
        tokio::fs::create_dir_all(&s.config.upload_dir).await?;
        tokio::fs::write(s.config.upload_dir.join(&name), &data).await?;
        tracing::info!(file = %name, bytes = data.len(), admin_id = %admin.id, "image uploaded");
        return Ok((StatusCode::CREATED, Json(UploadResponse { url: format!("{PUBLIC_PREFIX}{name}") })));
    }
    Err(StoreError::Validation("no file received".into()))
}

/// `<millis>_<name>` with path components dropped and unsafe characters replaced.
pub fn stored_file_name(original: &str, millis: i64) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let clean = clean.trim_start_matches('.');
    format!("{millis}_{}", if clean.is_empty() { "image" } else { clean })
}

/// Local file behind a public `/uploads/...` url, if the url points at one.
pub fn local_path(upload_dir: &Path, url: &str) -> Option<std::path::PathBuf> {
    let name = url.strip_prefix(PUBLIC_PREFIX)?;
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) { return None; }
    Some(upload_dir.join(name))
}

/// Deletes a previously uploaded image. Remote urls are ignored.
pub async fn remove_local_image(upload_dir: &Path, url: &str) {
    let Some(path) = local_path(upload_dir, url) else { return };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::info!(path = %path.display(), "removed uploaded image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove uploaded image"),
    }
}
