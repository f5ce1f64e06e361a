//! SQLite-backed document store.
//!
//! A fresh connection is opened per operation, so the store is `Send + Sync`
//! without sharing a `Connection`. WAL mode lets readers proceed while a
//! writer holds a transaction; chunk replacement happens inside a single
//! `IMMEDIATE` transaction. Every operation runs on tokio's blocking pool.

use super::{check_dimension, check_query, make_stats, rank_nearest, DocumentStore};
use super::{bytes_to_embedding, embedding_to_bytes};
use crate::types::{ChunkRecord, DocumentRecord, NewChunk, RetrievalHit, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    hash TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, ordinal);

CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const DIMENSION_KEY: &str = "embedding_dimension";

/// Persistent store in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

fn store_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Store(format!("{}: {}", context, e))
}

fn parse_ts(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(DocumentRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        hash: row.get(2)?,
        chunk_count: row.get::<_, i64>(3)? as u32,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    let embedding = match row.get::<_, Option<Vec<u8>>>(4)? {
        Some(bytes) => Some(bytes_to_embedding(&bytes).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Blob, Box::new(e))
        })?),
        None => None,
    };

    let metadata_json: String = row.get(5)?;
    let metadata: serde_json::Value = serde_json::from_str(&metadata_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(ChunkRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        ordinal: row.get::<_, i64>(2)? as u32,
        content: row.get(3)?,
        embedding,
        metadata,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

const CHUNK_COLUMNS: &str =
    "id, document_id, ordinal, content, embedding, metadata, created_at, updated_at";

impl SqliteStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("Failed to create store directory: {}", e))
                })?;
            }
        }

        let store = Self {
            path: path.to_path_buf(),
        };

        let conn = store.connect()?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(store_err("Failed to enable WAL"))?;
        conn.execute_batch(SCHEMA)
            .map_err(store_err("Failed to create tables"))?;

        tracing::debug!("Initialized SQLite store at {:?}", path);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| AppError::Store(format!("Failed to open SQLite store: {}", e)))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(store_err("Failed to set busy timeout"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(store_err("Failed to enable foreign keys"))?;
        Ok(conn)
    }

    fn read_dimension(conn: &Connection) -> AppResult<Option<usize>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![DIMENSION_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err("Failed to read dimension"))?;

        value
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|e| AppError::Store(format!("Corrupt dimension value '{}': {}", v, e)))
            })
            .transpose()
    }

    fn has_vectors_in(conn: &Connection) -> AppResult<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chunks WHERE embedding IS NOT NULL)",
            [],
            |row| row.get(0),
        )
        .map_err(store_err("Failed to check vectors"))
    }

    /// Forget the recorded dimension once no chunk carries an embedding.
    ///
    /// Returns the dimension still in force.
    fn release_dimension_if_unused(conn: &Connection) -> AppResult<Option<usize>> {
        if Self::has_vectors_in(conn)? {
            return Self::read_dimension(conn);
        }
        conn.execute("DELETE FROM store_meta WHERE key = ?1", params![DIMENSION_KEY])
            .map_err(store_err("Failed to clear dimension"))?;
        Ok(None)
    }

    /// Run `op` against a fresh connection on the blocking thread pool.
    async fn run<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = store.connect()?;
            op(&mut conn)
        })
        .await
        .map_err(|e| AppError::Store(format!("SQLite task failed: {}", e)))?
    }

    fn upsert_document_tx(tx: &Transaction<'_>, id: &str, name: &str, hash: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO documents (id, name, hash, chunk_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                hash = excluded.hash,
                updated_at = excluded.updated_at",
            params![id, name, hash, now],
        )
        .map_err(store_err("Failed to upsert document"))?;
        Ok(())
    }

    fn replace_chunks_tx(tx: &Transaction<'_>, document_id: &str, chunks: &[NewChunk]) -> AppResult<u32> {
        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
                params![document_id],
                |row| row.get(0),
            )
            .map_err(store_err("Failed to look up document"))?;
        if !exists {
            return Err(AppError::Store(format!(
                "Cannot replace chunks of unknown document '{}'",
                document_id
            )));
        }

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])
            .map_err(store_err("Failed to delete chunks"))?;

        // With this document's old vectors gone, the dimension only binds if others remain
        let recorded = Self::release_dimension_if_unused(tx)?;
        let dimension = check_dimension(recorded, chunks)?;
        if recorded.is_none() {
            if let Some(dim) = dimension {
                tx.execute(
                    "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
                    params![DIMENSION_KEY, dim.to_string()],
                )
                .map_err(store_err("Failed to record dimension"))?;
            }
        }

        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (id, document_id, ordinal, content, embedding, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                )
                .map_err(store_err("Failed to prepare chunk insert"))?;

            for chunk in chunks {
                let metadata_json = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    chunk.id,
                    document_id,
                    chunk.ordinal as i64,
                    chunk.content,
                    chunk.embedding.as_deref().map(embedding_to_bytes),
                    metadata_json,
                    now,
                ])
                .map_err(store_err("Failed to insert chunk"))?;
            }
        }

        let count = chunks.len() as u32;
        tx.execute(
            "UPDATE documents SET chunk_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![count as i64, now, document_id],
        )
        .map_err(store_err("Failed to update chunk count"))?;

        Ok(count)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn upsert_document(&self, id: &str, name: &str, hash: &str) -> AppResult<()> {
        let (id, name, hash) = (id.to_string(), name.to_string(), hash.to_string());
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err("Failed to begin transaction"))?;
            Self::upsert_document_tx(&tx, &id, &name, &hash)?;
            tx.commit().map_err(store_err("Failed to commit document"))
        })
        .await
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[NewChunk]) -> AppResult<u32> {
        let document_id = document_id.to_string();
        let chunks = chunks.to_vec();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err("Failed to begin transaction"))?;
            let count = Self::replace_chunks_tx(&tx, &document_id, &chunks)?;
            tx.commit().map_err(store_err("Failed to commit chunks"))?;
            Ok(count)
        })
        .await
    }

    async fn sync_document(
        &self,
        id: &str,
        name: &str,
        hash: &str,
        chunks: &[NewChunk],
    ) -> AppResult<u32> {
        let (id, name, hash) = (id.to_string(), name.to_string(), hash.to_string());
        let chunks = chunks.to_vec();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err("Failed to begin transaction"))?;
            Self::upsert_document_tx(&tx, &id, &name, &hash)?;
            let count = Self::replace_chunks_tx(&tx, &id, &chunks)?;
            tx.commit().map_err(store_err("Failed to commit document"))?;

            tracing::debug!("Synced document '{}' with {} chunks", id, count);
            Ok(count)
        })
        .await
    }

    async fn delete_document(&self, id: &str) -> AppResult<bool> {
        let id = id.to_string();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err("Failed to begin transaction"))?;
            let deleted = tx
                .execute("DELETE FROM documents WHERE id = ?1", params![id])
                .map_err(store_err("Failed to delete document"))?;
            Self::release_dimension_if_unused(&tx)?;
            tx.commit().map_err(store_err("Failed to commit delete"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn nearest(
        &self,
        query: &[f32],
        threshold: f32,
        k: usize,
    ) -> AppResult<Vec<RetrievalHit>> {
        let query = query.to_vec();
        self.run(move |conn| {
            check_query(&query, threshold, Self::read_dimension(conn)?)?;
            if k == 0 {
                return Ok(Vec::new());
            }

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM chunks WHERE embedding IS NOT NULL ORDER BY document_id, ordinal",
                    CHUNK_COLUMNS
                ))
                .map_err(store_err("Failed to prepare query"))?;

            let chunks = stmt
                .query_map([], row_to_chunk)
                .map_err(store_err("Failed to query chunks"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_err("Failed to read chunk"))?;

            let hits = rank_nearest(chunks.iter(), &query, threshold, k);

            tracing::debug!(
                "Retrieved {} chunks above {:.2} (requested top-{})",
                hits.len(),
                threshold,
                k
            );

            Ok(hits)
        })
        .await
    }

    async fn all_document_hashes(&self) -> AppResult<HashMap<String, String>> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, hash FROM documents")
                .map_err(store_err("Failed to prepare hash query"))?;

            let hashes = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(store_err("Failed to query hashes"))?
                .collect::<rusqlite::Result<HashMap<String, String>>>()
                .map_err(store_err("Failed to read hash"))?;

            Ok(hashes)
        })
        .await
    }

    async fn get_document(&self, id: &str) -> AppResult<Option<DocumentRecord>> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, name, hash, chunk_count, created_at, updated_at FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()
            .map_err(store_err("Failed to get document"))
        })
        .await
    }

    async fn list_documents(&self) -> AppResult<Vec<DocumentRecord>> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, hash, chunk_count, created_at, updated_at FROM documents ORDER BY id",
                )
                .map_err(store_err("Failed to prepare document listing"))?;

            let documents = stmt
                .query_map([], row_to_document)
                .map_err(store_err("Failed to list documents"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_err("Failed to read document"))?;

            Ok(documents)
        })
        .await
    }

    async fn all_chunks(&self) -> AppResult<Vec<ChunkRecord>> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM chunks ORDER BY document_id, ordinal",
                    CHUNK_COLUMNS
                ))
                .map_err(store_err("Failed to prepare chunk listing"))?;

            let chunks = stmt
                .query_map([], row_to_chunk)
                .map_err(store_err("Failed to list chunks"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_err("Failed to read chunk"))?;

            Ok(chunks)
        })
        .await
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        self.run(|conn| {
            let documents: i64 = conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .map_err(store_err("Failed to count documents"))?;
            let chunks: i64 = conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(store_err("Failed to count chunks"))?;

            Ok(make_stats(
                documents as u32,
                chunks as u32,
                Self::read_dimension(conn)?,
            ))
        })
        .await
    }

    async fn has_vectors(&self) -> AppResult<bool> {
        self.run(|conn| Self::has_vectors_in(conn)).await
    }

    async fn clear_vectors(&self) -> AppResult<u32> {
        let cleared = self
            .run(|conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(store_err("Failed to begin transaction"))?;
                tx.execute("UPDATE chunks SET embedding = NULL", [])
                    .map_err(store_err("Failed to clear embeddings"))?;
                let documents = tx
                    .execute("UPDATE documents SET hash = ''", [])
                    .map_err(store_err("Failed to invalidate hashes"))?;
                tx.execute("DELETE FROM store_meta WHERE key = ?1", params![DIMENSION_KEY])
                    .map_err(store_err("Failed to clear dimension"))?;
                tx.commit().map_err(store_err("Failed to commit vector reset"))?;
                Ok(documents as u32)
            })
            .await?;

        tracing::info!("Cleared embeddings of {} documents", cleared);
        Ok(cleared)
    }

    async fn reset(&self) -> AppResult<()> {
        self.run(|conn| {
            let tx = conn
                .transaction()
                .map_err(store_err("Failed to begin transaction"))?;
            tx.execute_batch("DELETE FROM chunks; DELETE FROM documents; DELETE FROM store_meta;")
                .map_err(store_err("Failed to reset store"))?;
            tx.commit().map_err(store_err("Failed to commit reset"))
        })
        .await?;

        tracing::info!("Reset document store");
        Ok(())
    }
}
