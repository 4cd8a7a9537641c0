//! Document storage layer
//!
//! The backend treats storage as an opaque document store: JSON documents
//! grouped into named collections, with id lookup and find-by-field. The
//! client handle is constructed once at startup and injected into each
//! store component.

pub mod memory;
pub mod postgres;

use crate::Result;
use serde_json::Value;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;

/// Closure applied to a document under the store's write exclusion.
pub type UpdateFn = Box<dyn FnOnce(&mut Value) -> Result<()> + Send>;

/// Opaque document store contract.
#[async_trait::async_trait]
pub trait StorageClient: Send + Sync {
    /// Insert a document. Uses the document's `id` field when present,
    /// otherwise assigns a fresh uuid. Returns the id.
    async fn insert(&self, collection: &str, doc: Value) -> Result<String>;

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// All documents whose top-level string `field` equals `value`.
    /// Result order is unspecified.
    async fn find_by_field(&self, collection: &str, field: &str, value: &str)
        -> Result<Vec<Value>>;

    /// Every document in a collection. Result order is unspecified.
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>>;

    /// Overwrite a document wholesale (upsert).
    async fn save(&self, collection: &str, id: &str, doc: Value) -> Result<()>;

    /// Atomic read-modify-write of a single document. The closure runs
    /// with the document exclusively held, so concurrent updates to the
    /// same id serialize instead of racing. Returns the updated document,
    /// or `None` if the id does not exist.
    async fn update(&self, collection: &str, id: &str, mutate: UpdateFn)
        -> Result<Option<Value>>;

    /// Delete one document. Returns whether anything was deleted.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Delete every document matching a field value. Returns the count.
    async fn delete_by_field(&self, collection: &str, field: &str, value: &str)
        -> Result<u64>;
}

/// Pull the id out of a document, generating one when absent.
pub(crate) fn assign_id(doc: &mut Value) -> String {
    match doc.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Some(map) = doc.as_object_mut() {
                map.insert("id".to_string(), Value::String(id.clone()));
            }
            id
        }
    }
}
