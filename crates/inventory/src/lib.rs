//! Inventory domain module.
//!
//! This crate contains the per-item counter state machine, implemented purely as
//! deterministic domain logic (no IO, no async, no storage). Both the
//! read-modify-write adapter path and store-side atomic adjustments resolve
//! through [`Adjustment::resolve`], so the state machine is defined once.

pub mod command;

pub use command::{Adjustment, InventoryCommand, Mutation};
