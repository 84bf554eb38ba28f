//! SQLite-backed vector store.
//!
//! Persists documents and their embedded chunks, and runs brute-force
//! cosine similarity search over all stored vectors. Vectors are stored
//! as BLOBs of little-endian f32 bytes; similarity is computed in
//! process, which is fast enough for the corpus sizes this tool
//! targets (thousands of documents).
//!
//! # Schema
//!
//! - `documents` — one row per indexed document (content hash, mtime)
//! - `index_entries` — one row per chunk, keyed by
//!   `(document_id, chunk_index)`, with the embedding BLOB
//! - `index_meta` — key/value metadata, notably the embedding model
//!   identifier the index was built with
//!
//! Writes for a single document go through one transaction, so readers
//! never observe a document half-replaced.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{Document, IndexEntry, IndexStatus, RetrievedChunk};

const META_EMBEDDING_MODEL: &str = "embedding_model";

pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    /// Open (or create) the index database at `path` and run
    /// migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id            TEXT PRIMARY KEY,
                content_hash  TEXT NOT NULL,
                modified_at   INTEGER NOT NULL,
                indexed_at    INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_entries (
                document_id   TEXT NOT NULL,
                chunk_index   INTEGER NOT NULL,
                text          TEXT NOT NULL,
                document_hash TEXT NOT NULL,
                embedding     BLOB NOT NULL,
                PRIMARY KEY (document_id, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entries_document ON index_entries(document_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Embedding model identifier the index was built with, if any
    /// entries have ever been written.
    pub async fn embedding_model(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM index_meta WHERE key = ?")
            .bind(META_EMBEDDING_MODEL)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    pub async fn set_embedding_model(&self, model: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO index_meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(META_EMBEDDING_MODEL)
        .bind(model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Content hashes of all indexed documents, keyed by document id.
    pub async fn document_hashes(&self) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT id, content_hash FROM documents")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("id"), r.get("content_hash")))
            .collect())
    }

    pub async fn all_document_ids(&self) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT id FROM documents")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    /// Replace all index entries for one document atomically.
    ///
    /// Deletes the document's previous entries and inserts the new set
    /// in a single transaction. Returns the number of entries written.
    pub async fn replace_document(&self, doc: &Document, entries: &[IndexEntry]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (id, content_hash, modified_at, indexed_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                content_hash = excluded.content_hash,
                modified_at = excluded.modified_at,
                indexed_at = excluded.indexed_at",
        )
        .bind(&doc.id)
        .bind(&doc.content_hash)
        .bind(doc.modified_at)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(entries.len() as u64)
    }

    /// Insert or overwrite entries keyed by `(document_id, chunk_index)`.
    ///
    /// Unlike [`replace_document`](Self::replace_document) this does not
    /// remove entries outside the given set; it is the low-level upsert
    /// primitive.
    pub async fn upsert(&self, entries: &[IndexEntry]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            // Every entry must reference a documents row.
            sqlx::query(
                "INSERT INTO documents (id, content_hash, modified_at, indexed_at)
                 VALUES (?, ?, 0, ?)
                 ON CONFLICT(id) DO UPDATE SET content_hash = excluded.content_hash",
            )
            .bind(&entry.chunk.document_id)
            .bind(&entry.chunk.document_hash)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
            insert_entry(&mut tx, entry).await?;
        }
        tx.commit().await?;
        Ok(entries.len() as u64)
    }

    /// Delete a document and all of its entries. Returns the number of
    /// entries removed.
    pub async fn delete_by_document(&self, document_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Top-`k` entries by cosine similarity to `query_vec`.
    ///
    /// Ordering is total: descending score, then ascending chunk index,
    /// then document id, so equal scores rank deterministically.
    ///
    /// Fails with [`Error::DimsMismatch`] if any stored vector has a
    /// different dimensionality than the query; scoring incompatible
    /// vectors would silently rank everything at zero.
    pub async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT document_id, chunk_index, text, embedding FROM index_entries",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            if vector.len() != query_vec.len() {
                return Err(Error::DimsMismatch {
                    indexed: vector.len(),
                    configured: query_vec.len(),
                });
            }
            scored.push(RetrievedChunk {
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                score: cosine_similarity(query_vec, &vector),
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
                .then(a.document_id.cmp(&b.document_id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn status(&self) -> Result<IndexStatus> {
        let documents: i64 = sqlx::query("SELECT COUNT(*) AS n FROM documents")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        let entries: i64 = sqlx::query("SELECT COUNT(*) AS n FROM index_entries")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        let embedding_model = self.embedding_model().await?;
        Ok(IndexStatus {
            documents,
            entries,
            embedding_model,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &IndexEntry,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO index_entries (document_id, chunk_index, text, document_hash, embedding)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(document_id, chunk_index) DO UPDATE SET
            text = excluded.text,
            document_hash = excluded.document_hash,
            embedding = excluded.embedding",
    )
    .bind(&entry.chunk.document_id)
    .bind(entry.chunk.chunk_index)
    .bind(&entry.chunk.text)
    .bind(&entry.chunk.document_hash)
    .bind(vec_to_blob(&entry.vector))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn entry(doc: &str, idx: i64, text: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                document_id: doc.to_string(),
                chunk_index: idx,
                text: text.to_string(),
                document_hash: "hash".to_string(),
            },
            vector,
        }
    }

    fn doc(id: &str, hash: &str) -> Document {
        Document {
            id: id.to_string(),
            path: id.into(),
            body: String::new(),
            modified_at: 1,
            content_hash: hash.to_string(),
        }
    }

    async fn temp_store() -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(&dir.path().join("index.sqlite"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let (_dir, store) = temp_store().await;

        store
            .upsert(&[entry("a.md", 0, "old", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[entry("a.md", 0, "new", vec![0.0, 1.0])])
            .await
            .unwrap();

        let hits = store.search(&[0.0, 1.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn test_replace_document_drops_stale_entries() {
        let (_dir, store) = temp_store().await;
        let d = doc("a.md", "h1");

        store
            .replace_document(
                &d,
                &[
                    entry("a.md", 0, "one", vec![1.0, 0.0]),
                    entry("a.md", 1, "two", vec![1.0, 0.0]),
                    entry("a.md", 2, "three", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        // Shorter replacement must not leave chunk 2 behind.
        store
            .replace_document(&d, &[entry("a.md", 0, "only", vec![1.0, 0.0])])
            .await
            .unwrap();

        let status = store.status().await.unwrap();
        assert_eq!(status.documents, 1);
        assert_eq!(status.entries, 1);
    }

    #[tokio::test]
    async fn test_delete_by_document() {
        let (_dir, store) = temp_store().await;

        store
            .replace_document(
                &doc("a.md", "h"),
                &[entry("a.md", 0, "a", vec![1.0, 0.0])],
            )
            .await
            .unwrap();
        store
            .replace_document(
                &doc("b.md", "h"),
                &[entry("b.md", 0, "b", vec![1.0, 0.0])],
            )
            .await
            .unwrap();

        let removed = store.delete_by_document("a.md").await.unwrap();
        assert_eq!(removed, 1);

        let ids = store.all_document_ids().await.unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["b.md"]);
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let (_dir, store) = temp_store().await;

        store
            .upsert(&[
                entry("a.md", 0, "far", vec![0.0, 1.0]),
                entry("b.md", 0, "near", vec![1.0, 0.1]),
                entry("c.md", 0, "exact", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "exact");
        assert_eq!(hits[1].text, "near");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_tie_break_is_deterministic() {
        let (_dir, store) = temp_store().await;

        // All identical vectors: ties broken by chunk index, then id.
        store
            .upsert(&[
                entry("b.md", 1, "b1", vec![1.0, 0.0]),
                entry("b.md", 0, "b0", vec![1.0, 0.0]),
                entry("a.md", 1, "a1", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<_> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(order, vec!["b.md#0", "a.md#1", "b.md#1"]);
    }

    #[tokio::test]
    async fn test_search_rejects_dimension_mismatch() {
        let (_dir, store) = temp_store().await;

        store
            .upsert(&[entry("a.md", 0, "x", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let err = store.search(&[1.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimsMismatch {
                indexed: 3,
                configured: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_search_k_zero_and_empty_store() {
        let (_dir, store) = temp_store().await;
        assert!(store.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
        assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_model_meta() {
        let (_dir, store) = temp_store().await;
        assert_eq!(store.embedding_model().await.unwrap(), None);

        store.set_embedding_model("nomic-embed-text").await.unwrap();
        assert_eq!(
            store.embedding_model().await.unwrap().as_deref(),
            Some("nomic-embed-text")
        );

        store.set_embedding_model("other-model").await.unwrap();
        assert_eq!(
            store.embedding_model().await.unwrap().as_deref(),
            Some("other-model")
        );
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (_dir, store) = temp_store().await;

        store
            .replace_document(
                &doc("a.md", "h"),
                &[
                    entry("a.md", 0, "x", vec![1.0]),
                    entry("a.md", 1, "y", vec![1.0]),
                ],
            )
            .await
            .unwrap();

        let status = store.status().await.unwrap();
        assert_eq!(status.documents, 1);
        assert_eq!(status.entries, 2);
    }
}
