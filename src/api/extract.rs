//! Request extractors that reject with `StoreError`.
//!
//! Drop-in replacements for axum's `Json`, `Query` and `Path`: parse failures
//! become 400 responses with the JSON error body instead of axum's plain text.

use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::StoreError;

#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(StoreError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}

#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(StoreError))]
pub struct Query<T>(pub T);

#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(StoreError))]
pub struct Path<T>(pub T);
