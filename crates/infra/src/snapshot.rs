//! Inventory snapshots and their fan-out to observers.
//!
//! A [`Snapshot`] is the full inventory as read by one `list()`. Every adapter
//! operation ends with a fresh list, so observers never see a partially-applied
//! mutation; they see the whole collection as of after the write.
//!
//! [`SnapshotBus`] is a lightweight broadcast:
//!
//! - Each subscriber gets its own copy of every published snapshot
//! - Subscribers that have been dropped are pruned on the next publish
//! - Nothing is persisted; a subscriber only sees snapshots published after it
//!   subscribed (use `InventoryStore::latest()` for the current one)

use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pantry_core::{InventoryItem, ItemName, Quantity};

/// Point-in-time copy of the collection, in the store's enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<InventoryItem>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(items: Vec<InventoryItem>) -> Self {
        Self {
            items,
            taken_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity of `name`, if the item is in the snapshot.
    pub fn quantity_of(&self, name: &str) -> Option<Quantity> {
        self.items
            .iter()
            .find(|item| item.name.as_str() == name)
            .map(|item| item.quantity)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.quantity_of(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &ItemName> {
        self.items.iter().map(|item| &item.name)
    }

    /// Items only, ignoring when they were read.
    pub fn same_contents(&self, other: &Snapshot) -> bool {
        self.items == other.items
    }
}

/// A subscription to published snapshots.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything published so far and keep only the newest.
    pub fn latest(&self) -> Option<M> {
        self.receiver.try_iter().last()
    }
}

#[derive(Debug, Error)]
pub enum SnapshotBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("snapshot bus lock poisoned")]
    Poisoned,
}

/// In-process snapshot broadcast.
///
/// - No IO / no async
/// - Best-effort fan-out
#[derive(Debug)]
pub struct SnapshotBus {
    subscribers: Mutex<Vec<mpsc::Sender<Snapshot>>>,
}

impl SnapshotBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: Snapshot) -> Result<(), SnapshotBusError> {
        let mut subs = self.subscribers.lock().map_err(|_| SnapshotBusError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(snapshot.clone()).is_ok());

        Ok(())
    }

    pub fn subscribe(&self) -> Subscription<Snapshot> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl Default for SnapshotBus {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}
