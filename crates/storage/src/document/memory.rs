//! In-process document store.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{Document, DocumentStore, merge_json};

type Collection = BTreeMap<String, Value>;

/// Document store backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn documents<F>(&self, collection: &str, mut keep: F) -> Vec<Document>
    where
        F: FnMut(&Value) -> bool,
    {
        self.collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| keep(data))
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self.documents(collection, |_| true))
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        Ok(self.documents(collection, |data| data.get(field) == Some(value)))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        debug!(collection = %collection, id = %id, "document written");
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        let mut collections = self.collections.write();
        let doc = collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        merge_json(doc, patch);
        debug!(collection = %collection, id = %id, "document merged");
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        debug!(collection = %collection, id = %id, removed, "document deleted");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryDocumentStore::new();
        store.set("fl_files", "1", json!({ "id": "1" })).await.unwrap();

        assert_eq!(
            store.get("fl_files", "1").await.unwrap(),
            Some(json!({ "id": "1" }))
        );
        assert_eq!(store.get("fl_files", "2").await.unwrap(), None);
        assert_eq!(store.get("fl_folders", "1").await.unwrap(), None);

        assert!(store.delete("fl_files", "1").await.unwrap());
        assert!(!store.delete("fl_files", "1").await.unwrap());
        assert_eq!(store.count("fl_files"), 0);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = MemoryDocumentStore::new();
        for id in ["3", "1", "2"] {
            store.set("fl_folders", id, json!({ "id": id })).await.unwrap();
        }

        let ids: Vec<_> = store
            .list("fl_folders")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn query_eq_is_strict() {
        let store = MemoryDocumentStore::new();
        store
            .set("fl_files", "1", json!({ "type": "images", "folderId": "7" }))
            .await
            .unwrap();
        store
            .set("fl_files", "2", json!({ "type": "files", "folderId": 7 }))
            .await
            .unwrap();

        let images = store
            .query_eq("fl_files", "type", &json!("images"))
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "1");

        let numeric = store
            .query_eq("fl_files", "folderId", &json!(7))
            .await
            .unwrap();
        assert_eq!(numeric.len(), 1);
        assert_eq!(numeric[0].id, "2");
    }

    #[tokio::test]
    async fn merge_creates_and_updates() {
        let store = MemoryDocumentStore::new();
        store
            .merge("fl_settings", "general", json!({ "imageSizes": [{ "width": 100 }] }))
            .await
            .unwrap();
        let merged = store
            .merge("fl_settings", "general", json!({ "locale": "en-US" }))
            .await
            .unwrap();

        assert_eq!(
            merged,
            json!({ "imageSizes": [{ "width": 100 }], "locale": "en-US" })
        );
    }
}
