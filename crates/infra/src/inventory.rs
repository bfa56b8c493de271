//! Inventory store adapter (application-level orchestration).
//!
//! `InventoryStore` translates the five UI operations into calls against a
//! [`DocumentStore`] and republishes the full inventory after every one of them.
//!
//! ## Operation Flow
//!
//! ```text
//! add / increase_quantity / decrease_quantity / remove
//!   ↓
//! 1. Resolve the item's counter change (pantry-inventory state machine)
//!      ReadModifyWrite: get → resolve → set | delete | nothing
//!      Atomic:          adjust (one indivisible store call)
//!   ↓
//! 2. Refresh: list_all → Snapshot
//!   ↓
//! 3. Cache the snapshot (`latest()`) and publish it to subscribers
//!   ↓
//! Snapshot returned to the caller
//! ```
//!
//! ## Refresh-on-Write Contract
//!
//! Every mutating operation returns the snapshot read *after* its write. That
//! snapshot is authoritative until the next operation; callers re-render from
//! it (or from the bus, or `latest()`). There is no local cache other than the
//! last snapshot and no optimistic local update.
//!
//! ## Failure Semantics
//!
//! Nothing is retried and nothing is rolled back:
//!
//! - A failed read or write surfaces as `InventoryError::Store`; the collection
//!   is unchanged by that call.
//! - A failed refresh after a successful write surfaces as
//!   `InventoryError::RefreshFailed`; the write stays applied and `latest()`
//!   keeps the previous snapshot until the next successful `list()`.
//!
//! ## Concurrency
//!
//! In `ReadModifyWrite` mode the read and the write are separate remote calls.
//! Two overlapping `add(n)` calls can both read `Q` and both write `Q + 1`
//! (lost update). This is not detected. `Atomic` mode delegates to
//! `DocumentStore::adjust` and cannot lose updates; both modes produce the same
//! state transitions for non-overlapping calls.

use std::sync::RwLock;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use pantry_core::{InventoryItem, ItemName, Lookup};
use pantry_inventory::{InventoryCommand, Mutation};

use crate::snapshot::{Snapshot, SnapshotBus, Subscription};
use crate::store::{lookup, Document, DocumentStore, StoreError};

/// How a counter change reaches the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum MutationMode {
    /// `get` then `set`/`delete`: two remote calls, may lose concurrent updates.
    #[default]
    ReadModifyWrite,
    /// One `adjust` call applied atomically by the store.
    Atomic,
}

impl MutationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationMode::ReadModifyWrite => "read-modify-write",
            MutationMode::Atomic => "atomic",
        }
    }
}

impl core::fmt::Display for MutationMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MutationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read-modify-write" | "read_modify_write" | "rmw" => Ok(MutationMode::ReadModifyWrite),
            "atomic" => Ok(MutationMode::Atomic),
            other => Err(format!(
                "unknown mutation mode '{other}' (expected 'read-modify-write' or 'atomic')"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum InventoryError {
    /// A read or write of the item failed; the collection was not changed by it.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The mutation was applied but the trailing refresh failed.
    #[error("update of '{item}' was applied but the refresh failed: {source}")]
    RefreshFailed {
        item: ItemName,
        after: Lookup,
        #[source]
        source: StoreError,
    },
}

impl InventoryError {
    /// The underlying store failure, whichever step it came from.
    pub fn store_error(&self) -> &StoreError {
        match self {
            InventoryError::Store(e) => e,
            InventoryError::RefreshFailed { source, .. } => source,
        }
    }

    /// Whether the remote collection was changed before the error.
    pub fn mutation_applied(&self) -> bool {
        matches!(self, InventoryError::RefreshFailed { .. })
    }
}

/// Adapter between the UI layer and a remote document collection.
///
/// ## Generic Parameters
///
/// - `S`: document store (`InMemoryDocumentStore` in tests, `PostgresDocumentStore`
///   or `Arc<dyn DocumentStore>` from `StoreConfig::connect()` otherwise)
#[derive(Debug)]
pub struct InventoryStore<S> {
    store: S,
    mode: MutationMode,
    bus: SnapshotBus,
    latest: RwLock<Option<Snapshot>>,
}

impl<S> InventoryStore<S> {
    /// Adapter using the two-call read-modify-write path.
    pub fn new(store: S) -> Self {
        Self::with_mode(store, MutationMode::ReadModifyWrite)
    }

    pub fn with_mode(store: S, mode: MutationMode) -> Self {
        Self {
            store,
            mode,
            bus: SnapshotBus::new(),
            latest: RwLock::new(None),
        }
    }

    pub fn mode(&self) -> MutationMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// The snapshot from the last successful `list()`, if any.
    pub fn latest(&self) -> Option<Snapshot> {
        self.latest.read().ok().and_then(|s| s.clone())
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> Subscription<Snapshot> {
        self.bus.subscribe()
    }
}

impl<S> InventoryStore<S>
where
    S: DocumentStore,
{
    /// Read one item as `Present(quantity)` or `Absent`. Does not refresh.
    pub async fn lookup(&self, name: &ItemName) -> Result<Lookup, StoreError> {
        let doc = self.store.get(name.as_str()).await?;
        lookup(name.as_str(), doc)
    }

    /// Read the whole collection, replace the cached snapshot and publish it.
    ///
    /// Documents holding a quantity of zero or below are left out of the
    /// snapshot (with a warning) rather than failing the whole read.
    #[instrument(skip(self), fields(mode = %self.mode), err)]
    pub async fn list(&self) -> Result<Snapshot, StoreError> {
        let documents = self.store.list_all().await?;

        let mut items = Vec::with_capacity(documents.len());
        for (key, doc) in documents {
            match lookup(&key, Some(doc))? {
                Lookup::Present(quantity) => items.push(InventoryItem::new(key, quantity)),
                Lookup::Depleted(raw) => {
                    warn!(item = %key, quantity = raw, "skipping depleted document; decrease or remove deletes it");
                }
                Lookup::Absent => {}
            }
        }

        let snapshot = Snapshot::new(items);

        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(snapshot.clone());
        }
        if let Err(err) = self.bus.publish(snapshot.clone()) {
            warn!(error = %err, "failed to publish inventory snapshot");
        }

        info!(items = snapshot.len(), "inventory refreshed");
        Ok(snapshot)
    }

    /// Create `name` at quantity 1, or increment it.
    pub async fn add(&self, name: impl Into<ItemName>) -> Result<Snapshot, InventoryError> {
        self.execute(name.into(), InventoryCommand::Add).await
    }

    /// Decrement `name`, deleting it at 1. Absent items are left alone.
    ///
    /// This is the same transition as [`decrease_quantity`](Self::decrease_quantity);
    /// it never deletes an item with quantity above 1.
    pub async fn remove(&self, name: impl Into<ItemName>) -> Result<Snapshot, InventoryError> {
        self.execute(name.into(), InventoryCommand::Remove).await
    }

    /// Increment `name` if present. Never creates.
    pub async fn increase_quantity(&self, name: impl Into<ItemName>) -> Result<Snapshot, InventoryError> {
        self.execute(name.into(), InventoryCommand::Increase).await
    }

    /// Decrement `name`, deleting it at 1. Absent items are left alone.
    pub async fn decrease_quantity(&self, name: impl Into<ItemName>) -> Result<Snapshot, InventoryError> {
        self.execute(name.into(), InventoryCommand::Decrease).await
    }

    /// Apply `command` to `name`, then refresh.
    #[instrument(
        skip(self),
        fields(item = %name, command = command.command_type(), mode = %self.mode),
        err
    )]
    pub async fn execute(&self, name: ItemName, command: InventoryCommand) -> Result<Snapshot, InventoryError> {
        if name.is_empty() {
            warn!("empty item name; the document will be keyed by an empty string");
        }

        let after = self.mutate(&name, command).await?;
        debug!(?after, "item mutation settled");

        self.list().await.map_err(|source| InventoryError::RefreshFailed {
            item: name,
            after,
            source,
        })
    }

    async fn mutate(&self, name: &ItemName, command: InventoryCommand) -> Result<Lookup, StoreError> {
        let adjustment = command.adjustment();
        let key = name.as_str();

        match self.mode {
            MutationMode::Atomic => self.store.adjust(key, adjustment).await,
            MutationMode::ReadModifyWrite => {
                let before = self.lookup(name).await?;
                let mutation = adjustment.resolve(before);

                match mutation {
                    Mutation::Put(quantity) => self.store.set(key, Document::with_quantity(quantity)).await?,
                    Mutation::Delete => self.store.delete(key).await?,
                    Mutation::Noop => {}
                }

                Ok(mutation.after(before))
            }
        }
    }
}
