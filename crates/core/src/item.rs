use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Item name: the document key of an inventory item.
///
/// Case-preserving and compared case-sensitively (`"Apple"` and `"apple"` are
/// different items). Empty names are accepted; rejecting them is left to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemName(String);

impl ItemName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Name as shown to users: first character upper-cased, rest untouched.
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl ValueObject for ItemName {}

impl core::fmt::Display for ItemName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ItemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stock count of a present item. Always `>= 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: i64) -> DomainResult<Self> {
        if value < 1 {
            return Err(DomainError::invariant(format!(
                "quantity must be at least 1, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Apply a signed delta, saturating at `i64::MAX`. `None` means the item
    /// would drop to zero or below and must not exist.
    pub fn offset(self, delta: i64) -> Option<Self> {
        let next = self.0.saturating_add(delta);
        (next >= 1).then_some(Self(next))
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One row of the inventory as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: ItemName,
    pub quantity: Quantity,
}

impl InventoryItem {
    pub fn new(name: impl Into<ItemName>, quantity: Quantity) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

impl Entity for InventoryItem {
    type Id = ItemName;

    fn id(&self) -> &Self::Id {
        &self.name
    }
}

/// Result of looking an item up in the store.
///
/// A missing document is a valid state, not an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lookup {
    Present(Quantity),
    Absent,
    /// A document exists but its stored quantity is zero or negative
    /// (written by another client). Carries the raw value.
    Depleted(i64),
}

impl Lookup {
    pub fn quantity(self) -> Option<Quantity> {
        match self {
            Lookup::Present(q) => Some(q),
            Lookup::Absent | Lookup::Depleted(_) => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Lookup::Present(_))
    }
}

impl From<Option<Quantity>> for Lookup {
    fn from(value: Option<Quantity>) -> Self {
        match value {
            Some(q) => Lookup::Present(q),
            None => Lookup::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_name_capitalises_first_letter_only() {
        assert_eq!(ItemName::new("apple").display_name(), "Apple");
        assert_eq!(ItemName::new("green tea").display_name(), "Green tea");
        assert_eq!(ItemName::new("Apple").display_name(), "Apple");
        assert_eq!(ItemName::new("éclair").display_name(), "Éclair");
        assert_eq!(ItemName::new("").display_name(), "");
    }

    #[test]
    fn names_are_case_sensitive_keys() {
        assert_ne!(ItemName::new("apple"), ItemName::new("Apple"));
        assert_eq!(ItemName::new("apple").to_string(), "apple");
    }

    #[test]
    fn quantity_rejects_non_positive_values() {
        assert!(Quantity::new(1).is_ok());
        match Quantity::new(0).unwrap_err() {
            DomainError::InvariantViolation(msg) if msg.contains("at least 1") => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(Quantity::new(-4).is_err());
    }

    #[test]
    fn quantity_offset_drops_to_none_at_zero() {
        let two = Quantity::new(2).unwrap();
        assert_eq!(two.offset(-1), Some(Quantity::ONE));
        assert_eq!(Quantity::ONE.offset(-1), None);
        assert_eq!(Quantity::ONE.offset(1).map(Quantity::get), Some(2));
        let max = Quantity::new(i64::MAX).unwrap();
        assert_eq!(max.offset(1), Some(max));
    }

    #[test]
    fn item_serializes_as_name_and_quantity() {
        let item = InventoryItem::new("apple", Quantity::new(3).unwrap());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "apple", "quantity": 3 }));

        let bad = serde_json::from_value::<InventoryItem>(
            serde_json::json!({ "name": "apple", "quantity": 0 }),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn items_share_identity_by_name() {
        let a = InventoryItem::new("apple", Quantity::ONE);
        let b = InventoryItem::new("apple", Quantity::new(5).unwrap());
        let c = InventoryItem::new("Apple", Quantity::ONE);
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
        assert_ne!(a, b);
    }

    #[test]
    fn lookup_from_option() {
        assert_eq!(Lookup::from(None), Lookup::Absent);
        assert_eq!(Lookup::from(Some(Quantity::ONE)), Lookup::Present(Quantity::ONE));
        assert!(!Lookup::Absent.is_present());
        assert!(!Lookup::Depleted(0).is_present());
        assert_eq!(Lookup::Depleted(-3).quantity(), None);
        assert_eq!(Lookup::Present(Quantity::ONE).quantity(), Some(Quantity::ONE));
    }

    proptest! {
        /// Property: an offset either yields a valid quantity equal to the sum,
        /// or reports that the item must not exist.
        #[test]
        fn offset_never_produces_non_positive(start in 1i64..1_000_000, delta in -1_000_000i64..1_000_000) {
            let q = Quantity::new(start).unwrap();
            match q.offset(delta) {
                Some(next) => prop_assert_eq!(next.get(), start + delta),
                None => prop_assert!(start + delta < 1),
            }
        }
    }
}
