// =============================================================================
// Row Types
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::aggregates::{AddressSnapshot, Product};
use crate::domain::pricing::{DiscountPolicy, VolumeTier};
use crate::domain::value_objects::{Money, Quantity};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid, pub first_name: String, pub last_name: Option<String>, pub tax_id: Option<String>,
    pub birth_date: Option<NaiveDate>, pub email: String, pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub wants_invoice: bool, pub role: String,
    pub last_login: Option<DateTime<Utc>>, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AddressRow {
    pub id: Uuid, pub user_id: Uuid, pub region: String, pub commune: String, pub street: String,
    pub street_number: String, pub unit: Option<String>, pub recipient_first_name: Option<String>,
    pub recipient_last_name: Option<String>, pub recipient_phone: Option<String>, pub created_at: DateTime<Utc>,
}

impl AddressRow {
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            region: self.region.clone(),
            commune: self.commune.clone(),
            street: self.street.clone(),
            street_number: self.street_number.clone(),
            unit: self.unit.clone(),
            recipient_first_name: self.recipient_first_name.clone(),
            recipient_last_name: self.recipient_last_name.clone(),
            recipient_phone: self.recipient_phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingProfileRow {
    pub user_id: Uuid, pub business_name: String, pub tax_id: String, pub business_activity: String,
    pub phone: String, pub region: String, pub commune: String, pub street: String, pub street_number: String,
    pub unit: Option<String>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid, pub name: String, pub description: Option<String>, pub price: Decimal,
    pub image_url: Option<String>, pub category: Option<String>, pub stock: i32,
    pub discount_percent: Option<Decimal>, pub volume_tiers: Json<Vec<VolumeTier>>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub fn discount_policy(&self) -> Result<DiscountPolicy> {
        DiscountPolicy::from_parts(self.discount_percent, self.volume_tiers.0.clone())
            .map_err(|e| StoreError::Internal(format!("product {} has an invalid discount: {e}", self.id)))
    }

    pub fn to_aggregate(&self, currency: &str) -> Result<Product> {
        let stock = Quantity::new(u32::try_from(self.stock).unwrap_or(0));
        Ok(Product::new(self.id, &self.name, Money::new(self.price, currency), stock, self.discount_policy()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GalleryImage {
    pub id: Uuid, pub title: Option<String>, pub description: Option<String>, pub image_url: String,
    pub category: Option<String>, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialLink { pub id: Uuid, pub url: String, pub title: String, pub created_at: DateTime<Utc> }

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid, pub user_id: Option<Uuid>, pub status: String, pub total: Decimal, pub currency: String,
    pub ship_region: String, pub ship_commune: String, pub ship_street: String, pub ship_street_number: String,
    pub ship_unit: Option<String>, pub ship_recipient_first_name: Option<String>,
    pub ship_recipient_last_name: Option<String>, pub ship_recipient_phone: Option<String>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn shipping(&self) -> AddressSnapshot {
        AddressSnapshot {
            region: self.ship_region.clone(),
            commune: self.ship_commune.clone(),
            street: self.ship_street.clone(),
            street_number: self.ship_street_number.clone(),
            unit: self.ship_unit.clone(),
            recipient_first_name: self.ship_recipient_first_name.clone(),
            recipient_last_name: self.ship_recipient_last_name.clone(),
            recipient_phone: self.ship_recipient_phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: Uuid, pub order_id: Uuid, pub product_id: Option<Uuid>, pub product_name: String,
    pub quantity: i32, pub unit_price: Decimal, pub line_total: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow { pub session_id: String, pub product_id: Uuid, pub quantity: i32 }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::TierPrice;

    fn row(stock: i32, percent: Option<Decimal>, tiers: Vec<VolumeTier>) -> ProductRow {
        ProductRow {
            id: Uuid::now_v7(), name: "Lechuga".into(), description: None, price: Decimal::new(1000, 0),
            image_url: None, category: Some("Hidroponía".into()), stock, discount_percent: percent,
            volume_tiers: Json(tiers), created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn product_row_to_aggregate() {
        let p = row(7, Some(Decimal::new(10, 0)), vec![]).to_aggregate("CLP").unwrap();
        assert_eq!(p.stock().value(), 7);
        assert_eq!(p.unit_price_for(1).amount(), Decimal::new(900, 0));
    }

    #[test]
    fn conflicting_discount_columns_are_reported() {
        let tier = VolumeTier { min_quantity: 2, price: TierPrice::UnitPrice(Decimal::new(900, 0)) };
        assert!(row(1, Some(Decimal::new(10, 0)), vec![tier]).to_aggregate("CLP").is_err());
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = UserRow {
            id: Uuid::now_v7(), first_name: "Ana".into(), last_name: None, tax_id: None, birth_date: None,
            email: "ana@example.cl".into(), phone: None, password_hash: "$argon2id$secret".into(),
            wants_invoice: false, role: "customer".into(), last_login: None, created_at: Utc::now(),
        };
        let v = serde_json::to_value(&user).unwrap();
        assert!(v.get("password_hash").is_none());
        assert_eq!(v["email"], "ana@example.cl");
    }
}
