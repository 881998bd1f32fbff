//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ProductCreated { product_id: Uuid, name: String },
    ProductDeleted { product_id: Uuid },
    StockRestored { product_id: Uuid, quantity: u32 },
    OrderPlaced { order_id: Uuid, user_id: Uuid, total: Decimal, lines: usize, placed_at: DateTime<Utc> },
    OrderStatusChanged { order_id: Uuid, from: String, to: String },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::ProductCreated { .. } => "horizonte.products.created",
            Self::ProductDeleted { .. } => "horizonte.products.deleted",
            Self::StockRestored { .. } => "horizonte.stock.restored",
            Self::OrderPlaced { .. } => "horizonte.orders.placed",
            Self::OrderStatusChanged { .. } => "horizonte.orders.status_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_event_payload_is_tagged() {
        let e = DomainEvent::StockRestored { product_id: Uuid::nil(), quantity: 3 };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "stock_restored");
        assert_eq!(v["quantity"], 3);
        assert_eq!(e.subject(), "horizonte.stock.restored");
    }
}
