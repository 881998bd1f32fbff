//! Cart Aggregate

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::pricing::DiscountPolicy;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct Cart {
    session_id: String,
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
}

#[derive(Clone, Debug)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub available: u32,
    pub base_price: Money,
    pub discount: DiscountPolicy,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id(),
            name: product.name().to_string(),
            quantity,
            available: product.stock().value(),
            base_price: product.price().clone(),
            discount: product.discount().clone(),
        }
    }

    /// Unit price for the item's current quantity; tiers follow the merged quantity.
    pub fn unit_price(&self) -> Money {
        Money::new(self.discount.unit_price(self.base_price.amount(), self.quantity), self.base_price.currency())
    }

    pub fn line_total(&self) -> Money { self.unit_price().multiply(self.quantity).rounded() }
    pub fn exceeds_stock(&self) -> bool { self.quantity > self.available }
}

/// Serialized shape of a priced cart.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub session_id: String,
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub base_unit_price: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub available: u32,
    pub exceeds_stock: bool,
}

impl Cart {
    pub fn new(session_id: impl Into<String>, currency: &str) -> Self {
        Self { session_id: session_id.into(), items: vec![], subtotal: Money::zero(currency), currency: currency.to_string() }
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, item: CartItem) {
        if item.quantity == 0 { return; }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.recalculate();
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.retain(|i| i.product_id != product_id); }
        else { item.quantity = quantity; }
        self.recalculate();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.recalculate();
        Ok(())
    }

    pub fn view(&self) -> CartView {
        CartView {
            session_id: self.session_id.clone(),
            items: self.items.iter().map(|i| CartLineView {
                product_id: i.product_id,
                name: i.name.clone(),
                quantity: i.quantity,
                base_unit_price: i.base_price.amount(),
                unit_price: i.unit_price().amount(),
                line_total: i.line_total().amount(),
                available: i.available,
                exceeds_stock: i.exceeds_stock(),
            }).collect(),
            item_count: self.item_count(),
            subtotal: self.subtotal.amount(),
            currency: self.currency.clone(),
        }
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
    }
}

#[derive(Debug, Clone)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{TierPrice, VolumeTier};
    use crate::domain::value_objects::Quantity;

    fn tiered_product() -> Product {
        Product::new(Uuid::now_v7(), "Lechuga Francesa", Money::new(Decimal::new(1000, 0), "CLP"), Quantity::new(20),
            DiscountPolicy::Tiered(vec![VolumeTier { min_quantity: 3, price: TierPrice::UnitPrice(Decimal::new(800, 0)) }]))
    }

    #[test]
    fn test_cart_operations() {
        let p = tiered_product();
        let mut cart = Cart::new("sess-1", "CLP");
        cart.add_item(CartItem::from_product(&p, 2));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(2000, 0));
        cart.add_item(CartItem::from_product(&p, 1));
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.subtotal().amount(), Decimal::new(2400, 0));
    }

    #[test]
    fn test_update_to_zero_removes() {
        let p = tiered_product();
        let mut cart = Cart::new("sess-1", "CLP");
        cart.add_item(CartItem::from_product(&p, 2));
        cart.update_quantity(p.id(), 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
        assert!(cart.remove_item(p.id()).is_err());
    }

    #[test]
    fn test_view_flags_stock_overrun() {
        let p = tiered_product();
        let mut cart = Cart::new("sess-1", "CLP");
        cart.add_item(CartItem::from_product(&p, 25));
        let view = cart.view();
        assert_eq!(view.item_count, 25);
        assert!(view.items[0].exceeds_stock);
        assert_eq!(view.items[0].unit_price, Decimal::new(800, 0));
    }
}
