//! Horizonte Storefront
//!
//! Online store and back office for a hydroponic produce and gardening
//! supplies seller.
//!
//! ## Features
//! - Product catalog with flat and volume-tiered discounts
//! - Session carts and checkout with all-or-nothing stock debits
//! - Customer accounts, delivery addresses and invoice profiles
//! - Admin order desk, gallery, social links and image uploads

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod models;

use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;

pub use config::Config;
pub use error::{Result, StoreError};
pub use events::EventPublisher;

// =============================================================================
// Application State
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, events: EventPublisher) -> Self {
        Self { db, config: Arc::new(config), events }
    }
}

pub fn build_router(state: AppState) -> Router {
    api::router(state)
}
