//! Document store collaborators.
//!
//! Records are JSON documents addressed by `(collection, id)`. The storage
//! service only needs equality queries on a single top-level field.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// A stored document and its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Backend holding JSON documents grouped in collections.
///
/// Listing order is by document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Every document in a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;

    /// Documents whose top-level `field` equals `value` exactly.
    async fn query_eq(&self, collection: &str, field: &str, value: &Value)
    -> Result<Vec<Document>>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()>;

    /// Deep-merge `patch` into a document, creating it if absent.
    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value>;

    /// Remove a document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

/// Merge `patch` into `target`: objects merge key by key, anything else replaces.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}
