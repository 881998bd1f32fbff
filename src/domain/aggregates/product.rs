//! Product Aggregate

use rust_decimal::Decimal;
use uuid::Uuid;
use crate::domain::events::DomainEvent;
use crate::domain::pricing::{DiscountPolicy, PriceQuote};
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug)]
pub struct Product {
    id: Uuid,
    name: String,
    price: Money,
    stock: Quantity,
    discount: DiscountPolicy,
    events: Vec<DomainEvent>,
}

impl Product {
    pub fn new(id: Uuid, name: impl Into<String>, price: Money, stock: Quantity, discount: DiscountPolicy) -> Self {
        Self { id, name: name.into(), price, stock, discount, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> &Money { &self.price }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn discount(&self) -> &DiscountPolicy { &self.discount }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }

    /// Discounted unit price for a purchase of `quantity` units.
    pub fn unit_price_for(&self, quantity: u32) -> Money {
        Money::new(self.discount.unit_price(self.price.amount(), quantity), self.price.currency())
    }

    pub fn quote(&self, quantity: u32) -> PriceQuote { self.discount.quote(self.price.amount(), quantity) }

    /// Takes `quantity` units out of stock, or reports how many are left.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(quantity).ok_or_else(|| ProductError::InsufficientStock {
            product_id: self.id,
            name: self.name.clone(),
            requested: quantity,
            available: self.stock.value(),
        })?;
        Ok(())
    }

    pub fn restock(&mut self, quantity: u32) {
        self.stock = self.stock.add(quantity);
        self.raise_event(DomainEvent::StockRestored { product_id: self.id, quantity });
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    InsufficientStock { product_id: Uuid, name: String, requested: u32, available: u32 },
}

impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientStock { name, requested, available, .. } => {
                write!(f, "insufficient stock for {name}: requested {requested}, available {available}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingError { NegativePrice(Decimal), NegativeStock(i32) }

impl std::error::Error for ListingError {}
impl std::fmt::Display for ListingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativePrice(p) => write!(f, "price must not be negative, got {p}"),
            Self::NegativeStock(s) => write!(f, "stock must not be negative, got {s}"),
        }
    }
}

/// Validates fields an administrator sets on a product.
pub fn validate_listing(price: Decimal, stock: i32) -> Result<(), ListingError> {
    if price < Decimal::ZERO { return Err(ListingError::NegativePrice(price)); }
    if stock < 0 { return Err(ListingError::NegativeStock(stock)); }
    Ok(())
}
