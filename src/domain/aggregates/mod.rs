//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductError};
pub use order::{merge_lines, AddressSnapshot, LineItem, OrderError, OrderRequestLine, OrderStatus, PlacedOrder};
pub use cart::{Cart, CartError, CartItem, CartView};
