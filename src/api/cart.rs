//! Session carts. Lines are persisted per session id and priced on read.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::extract::{Json, Path};
use crate::domain::aggregates::{Cart, CartItem, CartView};
use crate::error::{Result, StoreError};
use crate::models::{CartItemRow, ProductRow};
use crate::AppState;

#[derive(Debug, Deserialize)] pub struct AddToCartRequest { pub product_id: Uuid, pub quantity: Option<u32> }
#[derive(Debug, Deserialize)] pub struct UpdateCartItemRequest { pub quantity: u32 }

pub(crate) fn check_session(session: &str) -> Result<()> {
    if session.trim().is_empty() || session.len() > 128 {
        return Err(StoreError::Validation("session id must be 1 to 128 characters".into()));
    }
    Ok(())
}

pub(crate) fn check_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).ok().filter(|q| *q > 0).ok_or_else(|| StoreError::Validation("quantity must be a positive number".into()))
}

async fn load_cart(s: &AppState, session: &str) -> Result<Cart> {
    let lines = sqlx::query_as::<_, CartItemRow>("SELECT session_id, product_id, quantity FROM cart_items WHERE session_id = $1 ORDER BY created_at, product_id")
        .bind(session).fetch_all(&s.db).await?;
    let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<Uuid, ProductRow> = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(&ids).fetch_all(&s.db).await?
        .into_iter().map(|p| (p.id, p)).collect();

    let mut cart = Cart::new(session, &s.config.currency);
    for line in &lines {
        let Some(row) = products.get(&line.product_id) else { continue };
        let product = row.to_aggregate(&s.config.currency)?;
        cart.add_item(CartItem::from_product(&product, line.quantity.max(0) as u32));
    }
    Ok(cart)
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartView>> {
    check_session(&session)?;
    Ok(Json(load_cart(&s, &session).await?.view()))
}

pub async fn add_item(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> Result<(StatusCode, Json<CartView>)> {
    check_session(&session)?;
    let quantity = check_quantity(r.quantity.unwrap_or(1))?;
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1").bind(r.product_id).fetch_optional(&s.db).await?;
    if exists.is_none() { return Err(StoreError::NotFound("product")); }
    sqlx::query(
        "INSERT INTO cart_items (session_id, product_id, quantity, created_at, updated_at) VALUES ($1, $2, $3, NOW(), NOW()) \
         ON CONFLICT (session_id, product_id) DO UPDATE SET quantity = LEAST(cart_items.quantity::bigint + $3, 2147483647)::int, updated_at = NOW()")
        .bind(&session).bind(r.product_id).bind(quantity).execute(&s.db).await?;
    Ok((StatusCode::CREATED, Json(load_cart(&s, &session).await?.view())))
}

/// Sets a line's quantity; zero removes the line.
pub async fn update_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>, Json(r): Json<UpdateCartItemRequest>) -> Result<Json<CartView>> {
    check_session(&session)?;
    let mut cart = load_cart(&s, &session).await?;
    cart.update_quantity(product_id, r.quantity)?;
    if r.quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2").bind(&session).bind(product_id).execute(&s.db).await?;
    } else {
        let quantity = check_quantity(r.quantity)?;
        sqlx::query("UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE session_id = $1 AND product_id = $2")
            .bind(&session).bind(product_id).bind(quantity).execute(&s.db).await?;
    }
    Ok(Json(cart.view()))
}

pub async fn remove_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> Result<Json<CartView>> {
    check_session(&session)?;
    let mut cart = load_cart(&s, &session).await?;
    cart.remove_item(product_id)?;
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2").bind(&session).bind(product_id).execute(&s.db).await?;
    Ok(Json(cart.view()))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode> {
    check_session(&session)?;
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&session).execute(&s.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
