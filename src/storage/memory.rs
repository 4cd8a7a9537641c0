//! In-memory storage backend for development and tests

use super::{assign_id, StorageClient, UpdateFn};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local document store: collection name → (id → document).
pub struct InMemoryStorage {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageClient for InMemoryStorage {
    async fn insert(&self, collection: &str, mut doc: Value) -> Result<String> {
        let id = assign_id(&mut doc);

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc);

        Ok(id)
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| doc.get(field).and_then(Value::as_str) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mutate: UpdateFn,
    ) -> Result<Option<Value>> {
        // Write lock held across the whole read-modify-write, so two
        // appends to the same document cannot interleave.
        let mut collections = self.collections.write().await;

        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Ok(None);
        };

        mutate(doc)?;
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<u64> {
        let mut collections = self.collections.write().await;

        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|_, doc| doc.get(field).and_then(Value::as_str) != Some(value));

        Ok((before - docs.len()) as u64)
    }
}
