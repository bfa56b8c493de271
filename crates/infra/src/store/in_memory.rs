use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use pantry_core::Lookup;
use pantry_inventory::{Adjustment, Mutation};

use super::r#trait::{lookup, Document, DocumentStore, StoreError};

/// In-memory document collection.
///
/// Intended for tests/dev. Enumerates documents in key order. The lock is held
/// only inside a single call, never across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the collection (e.g. with documents another client wrote).
    pub fn with_documents(documents: impl IntoIterator<Item = (String, Document)>) -> Self {
        Self {
            documents: RwLock::new(documents.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::transport("lock poisoned")
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &str) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.get(key).cloned())
    }

    async fn set(&self, key: &str, document: Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.insert(key.to_string(), document);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.remove(key);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<(String, Document)>, StoreError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents
            .iter()
            .map(|(k, d)| (k.clone(), d.clone()))
            .collect())
    }

    async fn adjust(&self, key: &str, adjustment: Adjustment) -> Result<Lookup, StoreError> {
        // Read, decide and write under one write guard.
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        let before = lookup(key, documents.get(key).cloned())?;
        let mutation = adjustment.resolve(before);

        match mutation {
            Mutation::Put(quantity) => {
                documents.insert(key.to_string(), Document::with_quantity(quantity));
            }
            Mutation::Delete => {
                documents.remove(key);
            }
            Mutation::Noop => {}
        }

        Ok(mutation.after(before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_core::Quantity;
    use pantry_inventory::InventoryCommand;
    use std::sync::Arc;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[tokio::test]
    async fn set_get_delete() {
        let store = InMemoryDocumentStore::new();
        assert!(store.get("apple").await.unwrap().is_none());

        store.set("apple", Document::with_quantity(qty(2))).await.unwrap();
        let doc = store.get("apple").await.unwrap().unwrap();
        assert_eq!(doc.quantity("apple").unwrap(), qty(2));

        store.delete("apple").await.unwrap();
        assert!(store.get("apple").await.unwrap().is_none());

        // Deleting an absent key succeeds.
        store.delete("apple").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn set_overwrites_whole_document() {
        let mut fields = serde_json::Map::new();
        fields.insert("quantity".into(), 4.into());
        fields.insert("note".into(), "pantry".into());
        let store = InMemoryDocumentStore::with_documents([("apple".to_string(), Document::new(fields))]);

        store.set("apple", Document::with_quantity(qty(5))).await.unwrap();
        let doc = store.get("apple").await.unwrap().unwrap();
        assert_eq!(doc.fields().len(), 1);
    }

    #[tokio::test]
    async fn list_all_enumerates_in_key_order() {
        let store = InMemoryDocumentStore::new();
        for name in ["cherry", "apple", "banana"] {
            store.set(name, Document::with_quantity(Quantity::ONE)).await.unwrap();
        }
        let keys: Vec<_> = store.list_all().await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["apple", "banana", "cherry"]);
    }

    #[tokio::test]
    async fn adjust_follows_state_machine() {
        let store = InMemoryDocumentStore::new();
        let add = InventoryCommand::Add.adjustment();
        let dec = InventoryCommand::Decrease.adjustment();
        let inc = InventoryCommand::Increase.adjustment();

        assert_eq!(store.adjust("apple", inc).await.unwrap(), Lookup::Absent);
        assert!(store.is_empty());

        assert_eq!(store.adjust("apple", add).await.unwrap(), Lookup::Present(qty(1)));
        assert_eq!(store.adjust("apple", add).await.unwrap(), Lookup::Present(qty(2)));
        assert_eq!(store.adjust("apple", dec).await.unwrap(), Lookup::Present(qty(1)));
        assert_eq!(store.adjust("apple", dec).await.unwrap(), Lookup::Absent);
        assert!(store.get("apple").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn adjust_rejects_malformed_document() {
        let store = InMemoryDocumentStore::with_documents([("apple".to_string(), Document::default())]);
        let err = store
            .adjust("apple", InventoryCommand::Add.adjustment())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedDocument { .. }));
        // Left untouched.
        assert_eq!(store.get("apple").await.unwrap(), Some(Document::default()));
    }

    #[tokio::test]
    async fn adjust_deletes_depleted_document_on_decrement() {
        let mut fields = serde_json::Map::new();
        fields.insert("quantity".into(), 0.into());
        let store = InMemoryDocumentStore::with_documents([("apple".to_string(), Document::new(fields))]);

        let after = store
            .adjust("apple", InventoryCommand::Remove.adjustment())
            .await
            .unwrap();
        assert_eq!(after, Lookup::Absent);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adjusts_do_not_lose_updates() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.adjust("apple", InventoryCommand::Add.adjustment()).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let doc = store.get("apple").await.unwrap().unwrap();
        assert_eq!(doc.quantity("apple").unwrap(), qty(64));
    }
}
