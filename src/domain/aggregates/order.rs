//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::product::{Product, ProductError};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Orders in these states may be purged from history.
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Checks `self -> next`; `Ok(true)` means line quantities go back to stock.
    pub fn transition_to(&self, next: OrderStatus) -> Result<bool, OrderError> {
        let illegal = *self == next
            || *self == Self::Cancelled
            || (*self == Self::Delivered && next == Self::Cancelled);
        if illegal { return Err(OrderError::IllegalTransition { from: *self, to: next }); }
        Ok(next == Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Delivery address copied onto the order when it is placed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub region: String,
    pub commune: String,
    pub street: String,
    pub street_number: String,
    pub unit: Option<String>,
    pub recipient_first_name: Option<String>,
    pub recipient_last_name: Option<String>,
    pub recipient_phone: Option<String>,
}

impl AddressSnapshot {
    pub fn one_line(&self) -> String {
        let mut line = format!("{}, {}, {} #{}", self.region, self.commune, self.street, self.street_number);
        if let Some(unit) = self.unit.as_deref().filter(|u| !u.trim().is_empty()) {
            line.push_str(", ");
            line.push_str(unit);
        }
        line
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct OrderRequestLine { pub product_id: Uuid, pub quantity: u32 }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub quantity: u32, pub unit_price: Money, pub total: Money }

/// Collapses repeated products into one line each, in first-seen order.
pub fn merge_lines(lines: &[OrderRequestLine]) -> Result<Vec<OrderRequestLine>, OrderError> {
    if lines.is_empty() { return Err(OrderError::NoItems); }
    let mut order: Vec<Uuid> = vec![];
    let mut totals: HashMap<Uuid, u32> = HashMap::new();
    for line in lines {
        if line.quantity == 0 || line.quantity > i32::MAX as u32 { return Err(OrderError::InvalidQuantity(line.product_id)); }
        let entry = totals.entry(line.product_id).or_insert_with(|| { order.push(line.product_id); 0 });
        *entry = entry.checked_add(line.quantity).filter(|q| *q <= i32::MAX as u32).ok_or(OrderError::InvalidQuantity(line.product_id))?;
    }
    Ok(order.into_iter().map(|product_id| OrderRequestLine { product_id, quantity: totals[&product_id] }).collect())
}

#[derive(Clone, Debug)]
pub struct PlacedOrder {
    id: Uuid,
    user_id: Uuid,
    status: OrderStatus,
    items: Vec<LineItem>,
    total: Money,
    shipping: AddressSnapshot,
    placed_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl PlacedOrder {
    /// Prices every line and takes its quantity out of stock. Either every
    /// product has enough stock and all are debited, or nothing changes.
    pub fn place(
        user_id: Uuid,
        products: &mut BTreeMap<Uuid, Product>,
        lines: &[OrderRequestLine],
        shipping: AddressSnapshot,
        currency: &str,
    ) -> Result<Self, OrderError> {
        let lines = merge_lines(lines)?;
        for line in &lines {
            let product = products.get(&line.product_id).ok_or(OrderError::UnknownProduct(line.product_id))?;
            product.clone().reserve(line.quantity)?;
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut total = Money::zero(currency);
        for line in &lines {
            let Some(product) = products.get_mut(&line.product_id) else { return Err(OrderError::UnknownProduct(line.product_id)) };
            product.reserve(line.quantity)?;
            let unit_price = product.unit_price_for(line.quantity);
            let line_total = unit_price.multiply(line.quantity).rounded();
            total = total.add(&line_total).map_err(|_| OrderError::CurrencyMismatch)?;
            items.push(LineItem { product_id: product.id(), name: product.name().to_string(), quantity: line.quantity, unit_price, total: line_total });
        }

        let id = Uuid::now_v7();
        let placed_at = Utc::now();
        let mut order = Self { id, user_id, status: OrderStatus::Pending, items, total, shipping, placed_at, events: vec![] };
        order.raise_event(DomainEvent::OrderPlaced { order_id: id, user_id, total: order.total.amount(), lines: order.items.len(), placed_at });
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total(&self) -> &Money { &self.total }
    pub fn shipping(&self) -> &AddressSnapshot { &self.shipping }
    pub fn placed_at(&self) -> DateTime<Utc> { self.placed_at }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    NoItems,
    InvalidQuantity(Uuid),
    UnknownProduct(Uuid),
    Stock(ProductError),
    UnknownStatus(String),
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    CurrencyMismatch,
}

impl From<ProductError> for OrderError {
    fn from(e: ProductError) -> Self { Self::Stock(e) }
}

impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "order has no items"),
            Self::InvalidQuantity(id) => write!(f, "invalid quantity for product {id}"),
            Self::UnknownProduct(id) => write!(f, "product {id} not found"),
            Self::Stock(e) => write!(f, "{e}"),
            Self::UnknownStatus(s) => write!(f, "unknown order status '{s}'"),
            Self::IllegalTransition { from, to } => write!(f, "cannot move order from {from} to {to}"),
            Self::CurrencyMismatch => write!(f, "products are priced in different currencies"),
        }
    }
}
