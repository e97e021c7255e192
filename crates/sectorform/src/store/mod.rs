//! Document store abstraction for sectorform.
//!
//! The form core talks to persistence only through [`DocumentStore`]: four
//! collection-scoped asynchronous operations over schema-less documents.
//! Handles are constructed explicitly and shared as `Arc<dyn DocumentStore>`.

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::{MemoryStore, StoreOp};
pub use sqlite::{SqliteStore, StoreStats};

/// The fields of a stored document, keyed by field name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A document as returned by the store: its identifier plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier, unique within the collection.
    pub id: String,
    /// Document body.
    pub fields: Fields,
}

impl Document {
    /// Create a document from an identifier and its fields.
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Collection-scoped CRUD operations against a document store.
///
/// Every operation may fail with a store error (transport, auth, permission).
/// Implementations provide no locking or conflict detection between callers:
/// the last write to complete wins.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// List every document in a collection, in store order.
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;

    /// Create a document and return the identifier the store assigned.
    async fn create(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Replace the whole document with the given identifier, creating it if
    /// it does not exist.
    async fn upsert_by_id(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Delete the document with the given identifier.
    ///
    /// Deleting a missing document is not an error.
    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()>;
}

/// Generate a store identifier: 20 alphanumeric characters.
#[must_use]
pub fn new_document_id() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut value = uuid::Uuid::new_v4().as_u128();
    let mut id = String::with_capacity(20);
    for _ in 0..20 {
        let digit = usize::try_from(value % 62).unwrap_or_default();
        id.push(char::from(ALPHABET[digit]));
        value /= 62;
    }
    id
}
