//! Storefront domain model: pricing, stock and order lifecycle rules.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;
