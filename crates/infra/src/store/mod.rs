//! Remote document collection boundary.
//!
//! This module defines the storage abstraction the inventory adapter talks to,
//! plus an in-memory implementation for tests/dev and a Postgres one.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use r#trait::{lookup, Document, DocumentStore, StoreError, QUANTITY_FIELD};
