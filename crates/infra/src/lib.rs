//! Infrastructure layer: document stores, snapshot fan-out, configuration, and
//! the inventory adapter that ties them together.

pub mod config;
pub mod inventory;
pub mod snapshot;
pub mod store;

pub use config::{Backend, ConfigError, StoreConfig};
pub use inventory::{InventoryError, InventoryStore, MutationMode};
pub use snapshot::{Snapshot, SnapshotBus, Subscription};
pub use store::{Document, DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoreError};
