//! Product catalog: public browsing and price quotes, admin maintenance.

use axum::{extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::api::extract::{Json, Path, Query};
use crate::api::{like_pattern, non_blank, uploads, ListParams, PaginatedResponse};
use crate::auth::AdminUser;
use crate::domain::events::DomainEvent;
use crate::domain::pricing::{DiscountPolicy, PriceQuote, VolumeTier};
use crate::domain::aggregates::product::validate_listing;
use crate::error::{Result, StoreError};
use crate::models::ProductRow;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: ProductRow,
    /// Unit price for a single unit after any flat discount.
    pub current_price: Decimal,
    pub in_stock: bool,
}

impl ProductView {
    fn from_row(product: ProductRow) -> Result<Self> {
        let current_price = product.discount_policy()?.unit_price(product.price, 1);
        Ok(Self { in_stock: product.stock > 0, current_price, product })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub stock: i32,
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub volume_tiers: Vec<VolumeTier>,
}

impl ProductInput {
    /// Field checks plus the discount policy the product will carry.
    fn check(&self) -> Result<DiscountPolicy> {
        self.validate()?;
        validate_listing(self.price, self.stock)?;
        let mut tiers = self.volume_tiers.clone();
        tiers.sort_by_key(|t| t.min_quantity);
        Ok(DiscountPolicy::from_parts(self.discount_percent, tiers)?)
    }
}

/// Partial product edit: only the fields present in the request change.
///
/// `description`, `image_url` and `category` are cleared with an empty string.
/// The discount columns are replaced together when either is sent, so
/// `{"volume_tiers": []}` removes any discount.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub discount_percent: Option<Decimal>,
    pub volume_tiers: Option<Vec<VolumeTier>>,
}

impl ProductUpdate {
    /// Overlays the request onto the stored product.
    fn merge(self, previous: &ProductRow) -> Result<ProductInput> {
        self.validate()?;
        let overlay = |new: Option<String>, old: &Option<String>| match new { Some(v) => non_blank(Some(v)), None => old.clone() };
        let replace_discount = self.discount_percent.is_some() || self.volume_tiers.is_some();
        Ok(ProductInput {
            name: self.name.unwrap_or_else(|| previous.name.clone()),
            description: overlay(self.description, &previous.description),
            price: self.price.unwrap_or(previous.price),
            image_url: overlay(self.image_url, &previous.image_url),
            category: overlay(self.category, &previous.category),
            stock: self.stock.unwrap_or(previous.stock),
            discount_percent: if replace_discount { self.discount_percent } else { previous.discount_percent },
            volume_tiers: if replace_discount { self.volume_tiers.unwrap_or_default() } else { previous.volume_tiers.0.clone() },
        })
    }
}

#[derive(Debug, Deserialize)] pub struct QuoteParams { pub quantity: Option<u32> }
#[derive(Debug, Serialize)] pub struct QuoteResponse { pub product_id: Uuid, #[serde(flatten)] pub quote: PriceQuote, pub available: i32 }
#[derive(Debug, Deserialize)] pub struct StockUpdate { pub stock: i32 }

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ProductView>>> {
    let (page, per_page, offset) = p.window();
    let category = non_blank(p.category.clone());
    let search = non_blank(p.search.clone()).map(|q| like_pattern(&q));
    let filter = "($1::text IS NULL OR category = $1) AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)";

    let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT * FROM products WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"))
        .bind(&category).bind(&search).bind(per_page as i64).bind(offset)
        .fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {filter}"))
        .bind(&category).bind(&search).fetch_one(&s.db).await?;

    let data = rows.into_iter().map(ProductView::from_row).collect::<Result<Vec<_>>>()?;
    Ok(Json(PaginatedResponse { data, total: total.0, page, per_page }))
}

async fn fetch_product(s: &AppState, id: Uuid) -> Result<ProductRow> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&s.db).await?
        .ok_or(StoreError::NotFound("product"))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductView>> {
    Ok(Json(ProductView::from_row(fetch_product(&s, id).await?)?))
}

pub async fn quote_product(State(s): State<AppState>, Path(id): Path<Uuid>, Query(q): Query<QuoteParams>) -> Result<Json<QuoteResponse>> {
    let quantity = q.quantity.unwrap_or(1);
    if quantity == 0 { return Err(StoreError::Validation("quantity must be at least 1".into())); }
    let row = fetch_product(&s, id).await?;
    let quote = row.discount_policy()?.quote(row.price, quantity);
    Ok(Json(QuoteResponse { product_id: row.id, quote, available: row.stock }))
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<String>>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT category FROM products WHERE category IS NOT NULL AND category <> '' ORDER BY category")
        .fetch_all(&s.db).await?;
    Ok(Json(rows.into_iter().map(|(c,)| c).collect()))
}

pub async fn create_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<ProductInput>) -> Result<(StatusCode, Json<ProductView>)> {
    let (percent, tiers) = r.check()?.to_parts();
    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (id, name, description, price, image_url, category, stock, discount_percent, volume_tiers, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.name.trim()).bind(non_blank(r.description)).bind(r.price).bind(non_blank(r.image_url))
        .bind(non_blank(r.category)).bind(r.stock).bind(percent).bind(SqlJson(tiers))
        .fetch_one(&s.db).await?;
    tracing::info!(product_id = %row.id, admin_id = %admin.id, "product created");
    s.events.publish(&DomainEvent::ProductCreated { product_id: row.id, name: row.name.clone() }).await;
    Ok((StatusCode::CREATED, Json(ProductView::from_row(row)?)))
}

pub async fn update_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<ProductUpdate>) -> Result<Json<ProductView>> {
    let mut tx = s.db.begin().await?;
    let previous = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(id).fetch_optional(&mut *tx).await?.ok_or(StoreError::NotFound("product"))?;
    let merged = r.merge(&previous)?;
    let (percent, tiers) = merged.check()?.to_parts();
    let row = sqlx::query_as::<_, ProductRow>(
        "UPDATE products SET name = $2, description = $3, price = $4, image_url = $5, category = $6, stock = $7, \
         discount_percent = $8, volume_tiers = $9, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(merged.name.trim()).bind(&merged.description).bind(merged.price).bind(&merged.image_url)
        .bind(&merged.category).bind(merged.stock).bind(percent).bind(SqlJson(tiers))
        .fetch_one(&mut *tx).await?;
    tx.commit().await?;
    if let Some(old) = previous.image_url.filter(|old| Some(old) != row.image_url.as_ref()) {
        uploads::remove_local_image(&s.config.upload_dir, &old).await;
    }
    tracing::info!(product_id = %id, admin_id = %admin.id, "product updated");
    Ok(Json(ProductView::from_row(row)?))
}

pub async fn set_stock(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<StockUpdate>) -> Result<Json<ProductView>> {
    if r.stock < 0 { return Err(StoreError::Validation("stock must not be negative".into())); }
    let row = sqlx::query_as::<_, ProductRow>("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.stock).fetch_optional(&s.db).await?.ok_or(StoreError::NotFound("product"))?;
    tracing::info!(product_id = %id, stock = r.stock, admin_id = %admin.id, "stock set");
    Ok(Json(ProductView::from_row(row)?))
}

pub async fn delete_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let deleted: Option<(Option<String>,)> = sqlx::query_as("DELETE FROM products WHERE id = $1 RETURNING image_url")
        .bind(id).fetch_optional(&s.db).await?;
    let (image_url,) = deleted.ok_or(StoreError::NotFound("product"))?;
    if let Some(url) = image_url {
        uploads::remove_local_image(&s.config.upload_dir, &url).await;
    }
    tracing::info!(product_id = %id, admin_id = %admin.id, "product deleted");
    s.events.publish(&DomainEvent::ProductDeleted { product_id: id }).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "Sustrato de coco".into(), description: None, price: Decimal::new(4990, 0), image_url: None,
            category: Some("Sustratos".into()), stock: 5, discount_percent: None, volume_tiers: vec![],
        }
    }

    #[test]
    fn product_input_checks() {
        assert_eq!(input().check().unwrap(), DiscountPolicy::None);
        let mut bad = input();
        bad.price = Decimal::new(-1, 0);
        assert!(matches!(bad.check(), Err(StoreError::Validation(_))));
        let mut bad = input();
        bad.name = String::new();
        assert!(matches!(bad.check(), Err(StoreError::Validation(_))));
    }

    fn stored() -> ProductRow {
        let tier = VolumeTier { min_quantity: 6, price: crate::domain::pricing::TierPrice::UnitPrice(Decimal::new(1000, 0)) };
        ProductRow {
            id: Uuid::now_v7(), name: "Lechuga".into(), description: Some("Hidropónica".into()), price: Decimal::new(1200, 0),
            image_url: Some("/uploads/1_lechuga.jpg".into()), category: Some("Hortalizas".into()), stock: 40,
            discount_percent: None, volume_tiers: SqlJson(vec![tier]),
            created_at: chrono::Utc::now(), updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn partial_update_keeps_omitted_fields() {
        let previous = stored();
        let update: ProductUpdate = serde_json::from_str(r#"{"name": "Lechuga Costina", "price": "1300"}"#).unwrap();
        let merged = update.merge(&previous).unwrap();
        assert_eq!(merged.name, "Lechuga Costina");
        assert_eq!(merged.price, Decimal::new(1300, 0));
        assert_eq!(merged.stock, 40);
        assert_eq!(merged.image_url.as_deref(), Some("/uploads/1_lechuga.jpg"));
        assert_eq!(merged.category.as_deref(), Some("Hortalizas"));
        assert_eq!(merged.volume_tiers, previous.volume_tiers.0);
        assert!(matches!(merged.check().unwrap(), DiscountPolicy::Tiered(_)));
    }

    #[test]
    fn partial_update_clears_explicitly() {
        let update: ProductUpdate = serde_json::from_str(r#"{"image_url": "", "volume_tiers": []}"#).unwrap();
        let merged = update.merge(&stored()).unwrap();
        assert_eq!(merged.image_url, None);
        assert_eq!(merged.check().unwrap(), DiscountPolicy::None);

        let update: ProductUpdate = serde_json::from_str(r#"{"discount_percent": "15"}"#).unwrap();
        let merged = update.merge(&stored()).unwrap();
        assert!(merged.volume_tiers.is_empty());
        assert!(matches!(merged.check().unwrap(), DiscountPolicy::Flat(_)));
    }

    #[test]
    fn partial_update_rejects_bad_values() {
        let update: ProductUpdate = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(matches!(update.merge(&stored()), Err(StoreError::Validation(_))));
        let update: ProductUpdate = serde_json::from_str(r#"{"stock": -3}"#).unwrap();
        assert!(matches!(update.merge(&stored()).unwrap().check(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn tiers_are_stored_sorted() {
        let mut r = input();
        r.volume_tiers = serde_json::from_str(r#"[{"min_quantity": 10, "kind": "percent", "value": 10}, {"min_quantity": 3, "kind": "percent", "value": 5}]"#).unwrap();
        let (_, tiers) = r.check().unwrap().to_parts();
        assert_eq!(tiers.iter().map(|t| t.min_quantity).collect::<Vec<_>>(), vec![3, 10]);
    }
}
