// =============================================================================
// Error Types
// =============================================================================

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::product::ListingError;
use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::domain::pricing::PricingError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("invalid email or password")]
    BadCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    InsufficientStock { product_id: Uuid, message: String },

    #[error("upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::BadCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::BadCredentials => "bad_credentials",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Database(_) => "store_error",
            Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let mut body = json!({ "error": self.code(), "message": message });
        if let Self::InsufficientStock { product_id, .. } = &self {
            body["product_id"] = json!(product_id);
        }
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = e.field_errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        Self::Validation(format!("invalid fields: {}", fields.join(", ")))
    }
}

impl From<ListingError> for StoreError {
    fn from(e: ListingError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CartError> for StoreError {
    fn from(_: CartError) -> Self { Self::NotFound("cart item") }
}

// Malformed bodies, query strings and path segments answer with the same JSON
// error shape as every other failure.
impl From<JsonRejection> for StoreError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE { return Self::Validation("request body is too large".into()); }
        Self::Validation(e.body_text())
    }
}

impl From<QueryRejection> for StoreError {
    fn from(e: QueryRejection) -> Self { Self::Validation(e.body_text()) }
}

impl From<PathRejection> for StoreError {
    fn from(e: PathRejection) -> Self {
        if e.status().is_server_error() { return Self::Internal(e.body_text()); }
        Self::Validation(e.body_text())
    }
}

impl From<PricingError> for StoreError {
    fn from(e: PricingError) -> Self { Self::Validation(e.to_string()) }
}

impl From<OrderError> for StoreError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Stock(ProductError::InsufficientStock { product_id, .. }) => {
                Self::InsufficientStock { product_id, message: e.to_string() }
            }
            OrderError::UnknownProduct(_) => Self::NotFound("product"),
            OrderError::IllegalTransition { .. } => Self::Conflict(e.to_string()),
            OrderError::CurrencyMismatch => Self::Internal(e.to_string()),
            OrderError::NoItems | OrderError::InvalidQuantity(_) | OrderError::UnknownStatus(_) => Self::Validation(e.to_string()),
        }
    }
}

/// Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
