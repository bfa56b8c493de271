//! `pantry-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! item names, quantities, and the typed result of looking an item up.

pub mod entity;
pub mod error;
pub mod item;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use item::{InventoryItem, ItemName, Lookup, Quantity};
pub use value_object::ValueObject;
