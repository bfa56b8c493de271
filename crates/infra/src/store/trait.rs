use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use pantry_core::{Lookup, Quantity};
use pantry_inventory::Adjustment;
use std::sync::Arc;

/// Name of the one field the inventory interprets.
pub const QUANTITY_FIELD: &str = "quantity";

/// A document held in the remote collection: a free-form JSON object.
///
/// Writes from this crate always produce `{"quantity": N}`, but documents
/// written by other clients may carry extra fields or none at all. Use
/// [`Document::quantity`] (or [`lookup`]) to get a typed view.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: JsonMap<String, JsonValue>,
}

impl Document {
    pub fn new(fields: JsonMap<String, JsonValue>) -> Self {
        Self { fields }
    }

    pub fn with_quantity(quantity: Quantity) -> Self {
        let mut fields = JsonMap::new();
        fields.insert(QUANTITY_FIELD.to_string(), JsonValue::from(quantity.get()));
        Self { fields }
    }

    pub fn fields(&self) -> &JsonMap<String, JsonValue> {
        &self.fields
    }

    pub fn into_fields(self) -> JsonMap<String, JsonValue> {
        self.fields
    }

    /// Stored integer quantity, without the `>= 1` check.
    pub fn raw_quantity(&self, key: &str) -> Result<i64, StoreError> {
        let raw = self
            .fields
            .get(QUANTITY_FIELD)
            .ok_or_else(|| StoreError::malformed(key, "missing quantity field"))?;
        raw.as_i64()
            .ok_or_else(|| StoreError::malformed(key, format!("quantity is not an integer: {raw}")))
    }

    /// Typed quantity of the document stored under `key`.
    pub fn quantity(&self, key: &str) -> Result<Quantity, StoreError> {
        Quantity::new(self.raw_quantity(key)?).map_err(|e| StoreError::malformed(key, e.to_string()))
    }
}

/// Turn a raw read into the discriminated `Present | Absent | Depleted` view.
///
/// Only a missing or non-integer quantity is an error; a stored quantity of
/// zero or below is reported as `Depleted` so decrements can still delete it.
pub fn lookup(key: &str, document: Option<Document>) -> Result<Lookup, StoreError> {
    let Some(doc) = document else {
        return Ok(Lookup::Absent);
    };
    let raw = doc.raw_quantity(key)?;
    Ok(Quantity::new(raw).map_or(Lookup::Depleted(raw), Lookup::Present))
}

/// Document store operation error.
///
/// A missing document is not an error; reads return `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The remote call failed (network, auth, quota, pool, lock poisoning).
    #[error("store transport failure: {0}")]
    Transport(String),

    /// A document exists but does not hold a usable quantity.
    #[error("malformed document '{key}': {reason}")]
    MalformedDocument { key: String, reason: String },
}

impl StoreError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Remote key-document collection.
///
/// One store instance is bound to one collection. Each call is individually
/// atomic; nothing is guaranteed across calls (a `get` followed by a `set` can
/// interleave with another client's writes).
///
/// ## Operations
///
/// - `get`: the document under `key`, or `None`
/// - `set`: create-or-replace; the given fields become the whole document
/// - `delete`: remove `key`; deleting an absent key succeeds
/// - `list_all`: every `(key, document)` pair, in the store's enumeration order
/// - `adjust`: apply an [`Adjustment`] to the counter under `key` as one
///   indivisible step and return the resulting state. This is the store-native
///   alternative to `get` + `set`/`delete` and cannot lose concurrent updates.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Document>, StoreError>;

    async fn set(&self, key: &str, document: Document) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<(String, Document)>, StoreError>;

    async fn adjust(&self, key: &str, adjustment: Adjustment) -> Result<Lookup, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Document>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, document: Document) -> Result<(), StoreError> {
        (**self).set(key, document).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn list_all(&self) -> Result<Vec<(String, Document)>, StoreError> {
        (**self).list_all().await
    }

    async fn adjust(&self, key: &str, adjustment: Adjustment) -> Result<Lookup, StoreError> {
        (**self).adjust(key, adjustment).await
    }
}
