use serde::{Deserialize, Serialize};

use pantry_core::{Lookup, Quantity};

/// The four mutating operations a UI can issue against one item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryCommand {
    /// Create at 1, or increment an existing item.
    Add,
    /// Increment an existing item; absent items stay absent.
    Increase,
    /// Decrement; an item at 1 is deleted.
    Decrease,
    /// Same state transition as `Decrease` (decrement, delete at 1). It does
    /// not delete unconditionally.
    Remove,
}

impl InventoryCommand {
    pub fn command_type(&self) -> &'static str {
        match self {
            InventoryCommand::Add => "inventory.item.add",
            InventoryCommand::Increase => "inventory.item.increase",
            InventoryCommand::Decrease => "inventory.item.decrease",
            InventoryCommand::Remove => "inventory.item.remove",
        }
    }

    pub fn adjustment(&self) -> Adjustment {
        match self {
            InventoryCommand::Add => Adjustment::new(1, true),
            InventoryCommand::Increase => Adjustment::new(1, false),
            InventoryCommand::Decrease | InventoryCommand::Remove => Adjustment::new(-1, false),
        }
    }
}

/// Signed change to one item's counter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Adjustment {
    pub delta: i64,
    /// Whether an absent item is created (only meaningful for `delta >= 1`).
    pub create_if_absent: bool,
}

impl Adjustment {
    pub fn new(delta: i64, create_if_absent: bool) -> Self {
        Self {
            delta,
            create_if_absent,
        }
    }

    /// Decide the write for the item's current state.
    ///
    /// - absent, create: `Put(delta)` (no-op when `delta < 1`)
    /// - absent, no create: `Noop`
    /// - present: `Put(q + delta)`, or `Delete` when that is `<= 0`
    /// - depleted (stored `q <= 0`): `Delete` on a decrement, otherwise
    ///   `Put(q + delta)` floored at 1
    pub fn resolve(&self, current: Lookup) -> Mutation {
        match current {
            Lookup::Absent if self.create_if_absent => {
                Quantity::new(self.delta).map_or(Mutation::Noop, Mutation::Put)
            }
            Lookup::Absent => Mutation::Noop,
            Lookup::Present(q) => q.offset(self.delta).map_or(Mutation::Delete, Mutation::Put),
            Lookup::Depleted(_) if self.delta < 0 => Mutation::Delete,
            Lookup::Depleted(_) if self.delta == 0 => Mutation::Noop,
            Lookup::Depleted(raw) => {
                Mutation::Put(Quantity::new(raw.saturating_add(self.delta)).unwrap_or(Quantity::ONE))
            }
        }
    }
}

/// Write to perform against the store for one item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create or overwrite with this quantity.
    Put(Quantity),
    Delete,
    Noop,
}

impl Mutation {
    /// State of the item once this mutation has been applied to `before`.
    pub fn after(&self, before: Lookup) -> Lookup {
        match self {
            Mutation::Put(q) => Lookup::Present(*q),
            Mutation::Delete => Lookup::Absent,
            Mutation::Noop => before,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Mutation::Noop)
    }
}
