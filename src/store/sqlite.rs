//! SQLite document backend
//!
//! Documents are stored as JSON text, one row per document, in insertion
//! order. Filtering, sorting and projection run through the shared engine
//! after the collection is read back.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{engine, Collection, DocumentStore, FindQuery};
use crate::error::StoreError;
use crate::query::{Document, Projection};

pub struct SqliteStore {
    db: Arc<Mutex<rusqlite::Connection>>,
}

pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            body TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;

    Ok(())
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path).map_err(|e| {
            StoreError::Connection(format!("Failed to open {}: {}", path.display(), e))
        })?;
        initialize_schema(&conn)?;

        tracing::info!("Opened SQLite document store at {}", path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        initialize_schema(&conn)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Appends documents to a collection in one transaction.
    pub async fn insert_many(
        &self,
        collection: Collection,
        documents: &[Document],
    ) -> Result<usize, StoreError> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO documents (collection, body) VALUES (?1, ?2)")?;
            for doc in documents {
                let body = serde_json::to_string(doc)
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                stmt.execute([collection.name(), body.as_str()])?;
            }
        }
        tx.commit()?;

        Ok(documents.len())
    }

    /// Removes every document of a collection.
    pub async fn clear(&self, collection: Collection) -> Result<usize, StoreError> {
        let db = self.db.lock().await;
        let deleted = db.execute(
            "DELETE FROM documents WHERE collection = ?1",
            [collection.name()],
        )?;
        Ok(deleted)
    }

    async fn load_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")?;
        let bodies = stmt
            .query_map([collection.name()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| match serde_json::from_str::<Value>(body) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(StoreError::Decode(format!(
                    "non-object document in '{}'",
                    collection.name()
                ))),
                Err(e) => Err(StoreError::Decode(e.to_string())),
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(
        &self,
        collection: Collection,
        query: FindQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self.load_collection(collection).await?;
        Ok(engine::run_find(&documents, &query))
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Projection,
    ) -> Result<Option<Document>, StoreError> {
        let query = FindQuery::new(filter).project(projection).limit(1);
        Ok(self.find(collection, query).await?.into_iter().next())
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection.name()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
