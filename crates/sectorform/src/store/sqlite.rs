//! `SQLite`-backed document store.
//!
//! Documents of every collection share one table. Bodies are stored as JSON
//! objects, and a project column keeps independent datasets apart inside a
//! single database file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{migrations, new_document_id, Document, DocumentStore, Fields};

/// Document store persisted in a local `SQLite` database.
///
/// Provides:
/// - Collection listing in insertion order
/// - Store-assigned document identifiers
/// - Whole-document replacement by identifier
/// - Per-project partitioning of the same database file
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Project the documents belong to.
    project: String,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a document store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, project: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening document store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        let project = project.into();
        info!(
            "Document store opened at {} (project '{}')",
            path.display(),
            project
        );
        Ok(Self {
            path,
            project,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(project: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            project: project.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the project this store reads and writes.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("document store connection lock poisoned"))
    }

    fn list_blocking(&self, collection: &str) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, body FROM documents
            WHERE project = ?1 AND collection = ?2
            ORDER BY seq ASC
            ",
        )?;

        let rows = stmt
            .query_map(params![self.project, collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let documents = rows
            .into_iter()
            .filter_map(|(id, body)| match decode_body(collection, id, &body) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!("Skipping document: {}", e);
                    None
                }
            })
            .collect();
        Ok(documents)
    }

    fn write_blocking(&self, collection: &str, id: &str, fields: &Fields) -> Result<()> {
        let body = serde_json::to_string(fields)?;
        let now = Utc::now().to_rfc3339();

        self.conn()?.execute(
            r"
            INSERT INTO documents (project, collection, id, body, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT (project, collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            ",
            params![self.project, collection, id, body, now],
        )?;
        Ok(())
    }

    fn delete_blocking(&self, collection: &str, id: &str) -> Result<usize> {
        let affected = self.conn()?.execute(
            "DELETE FROM documents WHERE project = ?1 AND collection = ?2 AND id = ?3",
            params![self.project, collection, id],
        )?;
        Ok(affected)
    }

    /// Count the documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self, collection: &str) -> Result<i64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE project = ?1 AND collection = ?2",
            params![self.project, collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Get store statistics for the configured project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let collections = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                r"
                SELECT collection, COUNT(*) FROM documents
                WHERE project = ?1
                GROUP BY collection ORDER BY collection
                ",
            )?;
            let rows: Vec<(String, i64)> = stmt
                .query_map([&self.project], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            project: self.project.clone(),
            collections,
            db_size_bytes,
        })
    }
}

fn decode_body(collection: &str, id: String, body: &str) -> Result<Document> {
    match serde_json::from_str(body) {
        Ok(serde_json::Value::Object(fields)) => Ok(Document::new(id, fields)),
        Ok(_) => Err(Error::document_decode(
            collection,
            id,
            "document body is not a JSON object",
        )),
        Err(e) => Err(Error::document_decode(collection, id, e.to_string())),
    }
}

/// Each call runs its SQLite work inline on the calling task while holding
/// the connection mutex. Statements are short and local, so the runtime
/// thread is only held for their duration; concurrent calls serialize on the
/// mutex.
#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let documents = self.list_blocking(collection)?;
        debug!("Listed {} documents from {}", documents.len(), collection);
        Ok(documents)
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = new_document_id();
        self.write_blocking(collection, &id, &fields)?;
        debug!("Created document {} in {}", id, collection);
        Ok(id)
    }

    async fn upsert_by_id(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.write_blocking(collection, id, &fields)?;
        debug!("Replaced document {} in {}", id, collection);
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()> {
        let affected = self.delete_blocking(collection, id)?;
        debug!(
            "Deleted document {} from {} ({} row(s))",
            id, collection, affected
        );
        Ok(())
    }
}

/// Statistics about the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Project the statistics cover.
    pub project: String,
    /// Document count per collection, sorted by collection name.
    pub collections: Vec<(String, i64)>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

impl StoreStats {
    /// Document count of one collection (0 when it holds no documents).
    #[must_use]
    pub fn count_of(&self, collection: &str) -> i64 {
        self.collections
            .iter()
            .find(|(name, _)| name == collection)
            .map_or(0, |(_, count)| *count)
    }
}
