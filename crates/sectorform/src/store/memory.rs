//! In-process document store.
//!
//! Keeps every collection in memory, in insertion order. Calls are counted
//! per operation and failures can be injected, so callers can check exactly
//! what reached the store and how they behave when it is unavailable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

use super::{new_document_id, Document, DocumentStore, Fields};

/// The four document store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `list`
    List,
    /// `create`
    Create,
    /// `upsert_by_id`
    Upsert,
    /// `delete_by_id`
    Delete,
}

impl StoreOp {
    fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct FailurePlan {
    /// Remaining failures; `None` fails forever.
    remaining: Option<usize>,
    /// Restrict failures to one operation.
    op: Option<StoreOp>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    calls: HashMap<StoreOp, usize>,
    failure: Option<FailurePlan>,
}

impl MemoryState {
    /// Record a call and decide whether it fails.
    fn begin(&mut self, op: StoreOp, collection: &str) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;

        let Some(mut plan) = self.failure else {
            return Ok(());
        };
        if plan.op.is_some_and(|only| only != op) {
            return Ok(());
        }
        match plan.remaining {
            Some(0) => {
                self.failure = None;
                return Ok(());
            }
            Some(n) => {
                plan.remaining = Some(n - 1);
                self.failure = (n > 1).then_some(plan);
            }
            None => {}
        }
        debug!("Injected failure for {} on {}", op, collection);
        Err(Error::store(op.name(), collection, "store unavailable"))
    }
}

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::internal("memory store lock poisoned"))
    }

    /// Seed a document directly, bypassing call counting and failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn insert(&self, collection: &str, document: Document) -> Result<()> {
        let mut state = self.state()?;
        let docs = state.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
        Ok(())
    }

    /// Snapshot of a collection's documents, bypassing call counting.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .state()?
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    /// Fail the next `count` calls of any operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn fail_next(&self, count: usize) -> Result<()> {
        self.state()?.failure = Some(FailurePlan {
            remaining: Some(count),
            op: None,
        });
        Ok(())
    }

    /// Fail the next `count` calls of one operation; other operations succeed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn fail_next_op(&self, op: StoreOp, count: usize) -> Result<()> {
        self.state()?.failure = Some(FailurePlan {
            remaining: Some(count),
            op: Some(op),
        });
        Ok(())
    }

    /// Fail every call until [`MemoryStore::recover`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn fail_always(&self) -> Result<()> {
        self.state()?.failure = Some(FailurePlan {
            remaining: None,
            op: None,
        });
        Ok(())
    }

    /// Clear any injected failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn recover(&self) -> Result<()> {
        self.state()?.failure = None;
        Ok(())
    }

    /// Number of calls made for one operation, failed calls included.
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of calls made across all operations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let mut state = self.state()?;
        state.begin(StoreOp::List, collection)?;
        Ok(state
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String> {
        let mut state = self.state()?;
        state.begin(StoreOp::Create, collection)?;
        let id = new_document_id();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id.clone(), fields));
        Ok(id)
    }

    async fn upsert_by_id(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut state = self.state()?;
        state.begin(StoreOp::Upsert, collection)?;
        let docs = state.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.fields = fields,
            None => docs.push(Document::new(id, fields)),
        }
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()> {
        let mut state = self.state()?;
        state.begin(StoreOp::Delete, collection)?;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }
}
