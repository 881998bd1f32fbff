//! HTTP surface: route table and shared request/response shapes.

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod extract;
pub mod gallery;
pub mod orders;
pub mod social;
pub mod uploads;
pub mod users;

use axum::{extract::DefaultBodyLimit, routing::{delete, get, post, put}, Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    let upload_dir = state.config.upload_dir.clone();

    let public = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "horizonte-storefront"})) }))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/products", get(catalog::list_products))
        .route("/api/v1/products/:id", get(catalog::get_product))
        .route("/api/v1/products/:id/quote", get(catalog::quote_product))
        .route("/api/v1/categories", get(catalog::list_categories))
        .route("/api/v1/gallery", get(gallery::list_images))
        .route("/api/v1/social-links", get(social::list_links))
        .route("/api/v1/cart/:session", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/items", post(cart::add_item))
        .route("/api/v1/cart/:session/items/:product_id", put(cart::update_item).delete(cart::remove_item));

    let account = Router::new()
        .route("/api/v1/account/profile", get(account::get_profile).put(account::update_profile))
        .route("/api/v1/account/password", put(account::change_password))
        .route("/api/v1/account/addresses", get(account::list_addresses).post(account::create_address))
        .route("/api/v1/account/addresses/:id", put(account::update_address).delete(account::delete_address))
        .route("/api/v1/account/billing", get(account::get_billing).put(account::put_billing).delete(account::delete_billing))
        .route("/api/v1/account/orders", get(orders::list_own_orders))
        .route("/api/v1/orders", post(orders::create_order))
        .route("/api/v1/checkout", post(orders::checkout));

    let admin = Router::new()
        .route("/api/v1/admin/products", post(catalog::create_product))
        .route("/api/v1/admin/products/:id", put(catalog::update_product).delete(catalog::delete_product))
        .route("/api/v1/admin/products/:id/stock", put(catalog::set_stock))
        .route("/api/v1/admin/gallery", post(gallery::create_image))
        .route("/api/v1/admin/gallery/:id", delete(gallery::delete_image))
        .route("/api/v1/admin/social-links", post(social::create_link))
        .route("/api/v1/admin/social-links/:id", delete(social::delete_link))
        .route("/api/v1/admin/uploads", post(uploads::upload_image).layer(DefaultBodyLimit::max(upload_limit.saturating_add(64 * 1024))))
        .route("/api/v1/admin/users", get(users::list_users))
        .route("/api/v1/admin/users/:id/role", put(users::set_role))
        .route("/api/v1/admin/users/:id", delete(users::delete_user))
        .route("/api/v1/admin/orders", get(orders::list_all_orders))
        .route("/api/v1/admin/orders/:id/status", put(orders::update_status))
        .route("/api/v1/admin/orders/history", delete(orders::purge_history));

    public
        .merge(account)
        .merge(admin)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub category: Option<String>, pub search: Option<String>, pub status: Option<String> }

impl ListParams {
    /// `(page, per_page, offset)` with page >= 1 and per_page in 1..=100.
    pub fn window(&self) -> (u32, u32, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page, (page as i64 - 1) * per_page as i64)
    }
}

#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

/// `%term%` for `ILIKE`, with the pattern metacharacters in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

/// Treats blank optional strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
