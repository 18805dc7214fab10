//! SQLite-backed vector index.
//!
//! Rows hold the chunk text, metadata and raw embedding; similarity search
//! runs against a normalized `(N, dim)` matrix kept in memory and rebuilt
//! lazily whenever an insert marks it dirty.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::schema::SCHEMA_SQL;
use crate::types::*;
use crate::vector::{decode_f32, encode_f32, normalize};
use estthmar_core::{Error, Result};

/// Database file name inside the index directory.
pub const DB_FILE_NAME: &str = "estthmar.db";

/// Persistent vector index.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
    embedding_matrix: Mutex<EmbeddingMatrix>,
}

struct EmbeddingMatrix {
    /// Normalized embeddings, shape (N, dim).
    matrix: Array2<f32>,
    /// Chunk IDs corresponding to each row.
    chunk_ids: Vec<i64>,
    dirty: bool,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SqliteStore {
    /// Open or create the index.
    ///
    /// `db_dir` is the directory (e.g., `data/vectordb/`). The file will be
    /// `db_dir/estthmar.db`.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(DB_FILE_NAME);

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
            embedding_matrix: Mutex::new(EmbeddingMatrix {
                matrix: Array2::zeros((0, embedding_dim)),
                chunk_ids: Vec::new(),
                dirty: true,
            }),
        };
        store.load_embedding_matrix()?;

        info!(
            "Vector index opened: {} documents, {} chunks, dim={}, path={}",
            store.count_documents()?,
            store.count_chunks()?,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    // ---------------------------------------------------------------
    // Inserts
    // ---------------------------------------------------------------

    /// Insert one source file and all its chunks in a single transaction.
    ///
    /// Nothing is written if any embedding has the wrong dimension. Returns the
    /// new document ID.
    pub fn add_document(
        &self,
        source: &str,
        page_count: usize,
        metadata: Option<&serde_json::Value>,
        chunks: &[NewChunk],
    ) -> Result<i64> {
        if let Some(bad) = chunks
            .iter()
            .find(|c| c.embedding.len() != self.embedding_dim)
        {
            return Err(Error::Storage(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                bad.embedding.len()
            )));
        }

        let now = now_millis();
        let meta_json = metadata.map(serde_json::to_string).transpose()?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT INTO documents (source, page_count, metadata_json, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![source, page_count as i64, meta_json, now],
        )
        .map_err(db_err)?;
        let doc_id = tx.last_insert_rowid();

        {
            let mut chunk_stmt = tx
                .prepare_cached(
                    "INSERT INTO chunks (doc_id, text, chunk_index, page, metadata_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(db_err)?;
            let mut emb_stmt = tx
                .prepare_cached(
                    "INSERT INTO chunk_embeddings (chunk_id, dimension, embedding) \
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(db_err)?;

            for (index, chunk) in chunks.iter().enumerate() {
                let chunk_meta = serde_json::to_string(&chunk.metadata)?;
                let chunk_id = chunk_stmt
                    .insert(params![
                        doc_id,
                        chunk.text,
                        index as i32,
                        chunk.page,
                        chunk_meta,
                        now
                    ])
                    .map_err(db_err)?;
                emb_stmt
                    .execute(params![
                        chunk_id,
                        chunk.embedding.len() as i64,
                        encode_f32(&chunk.embedding)
                    ])
                    .map_err(db_err)?;
            }
        }

        tx.commit().map_err(db_err)?;
        drop(conn);

        self.embedding_matrix.lock().dirty = true;
        debug!(
            "Stored document {} ({}) with {} chunks",
            doc_id,
            source,
            chunks.len()
        );
        Ok(doc_id)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Get a document by ID.
    pub fn get_document(&self, doc_id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached("SELECT * FROM documents WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![doc_id], |row| Ok(Self::row_to_document(row)))
            .optional()
            .map_err(db_err);
        result
    }

    /// Get a chunk by ID.
    pub fn get_chunk(&self, chunk_id: i64) -> Result<Option<Chunk>> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached("SELECT * FROM chunks WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![chunk_id], |row| Ok(Self::row_to_chunk(row)))
            .optional()
            .map_err(db_err);
        result
    }

    /// Get all chunks for a document in insertion order.
    pub fn get_chunks_for_document(&self, doc_id: i64) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![doc_id], |row| Ok(Self::row_to_chunk(row)))
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn count_documents(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM documents")
    }

    pub fn count_chunks(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM chunks")
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(sql, [], |row| row.get(0)).map_err(db_err)
    }

    // ---------------------------------------------------------------
    // Similarity search
    // ---------------------------------------------------------------

    fn load_embedding_matrix(&self) -> Result<()> {
        let mut mat = self.embedding_matrix.lock();
        self.reload_matrix(&mut mat)
    }

    /// Rebuild `mat` from the database. The caller holds the matrix lock for
    /// the whole read so a concurrent insert cannot be marked clean early.
    fn reload_matrix(&self, mat: &mut EmbeddingMatrix) -> Result<()> {
        let mut chunk_ids = Vec::new();
        let mut rows_data: Vec<Array1<f32>> = Vec::new();

        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT chunk_id, dimension, embedding FROM chunk_embeddings ORDER BY chunk_id")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    let chunk_id: i64 = row.get(0)?;
                    let dim: i64 = row.get(1)?;
                    let blob: Vec<u8> = row.get(2)?;
                    Ok((chunk_id, dim, blob))
                })
                .map_err(db_err)?;

            for row in rows {
                let (chunk_id, dim, blob) = row.map_err(db_err)?;
                if dim as usize != self.embedding_dim {
                    warn!(
                        "Skipping chunk {}: stored dim {} != index dim {}",
                        chunk_id, dim, self.embedding_dim
                    );
                    continue;
                }
                let Some(normalized) = decode_f32(&blob).and_then(|e| normalize(&e)) else {
                    continue;
                };
                chunk_ids.push(chunk_id);
                rows_data.push(normalized);
            }
        }

        let mut matrix = Array2::zeros((rows_data.len(), self.embedding_dim));
        for (i, emb) in rows_data.iter().enumerate() {
            matrix.row_mut(i).assign(emb);
        }

        mat.matrix = matrix;
        mat.chunk_ids = chunk_ids;
        mat.dirty = false;
        debug!("Loaded {} embeddings into matrix", mat.chunk_ids.len());
        Ok(())
    }

    fn ensure_matrix_loaded(&self) -> Result<()> {
        let mut mat = self.embedding_matrix.lock();
        if mat.dirty {
            self.reload_matrix(&mut mat)?;
        }
        Ok(())
    }

    /// Return up to `top_k` chunks whose cosine similarity to `query` is
    /// strictly greater than `score_threshold`, best first.
    pub fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        score_threshold: f64,
    ) -> Result<Vec<SearchHit>> {
        if query.len() != self.embedding_dim {
            return Err(Error::Storage(format!(
                "query dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                query.len()
            )));
        }
        self.ensure_matrix_loaded()?;

        let Some(q) = normalize(&Array1::from_vec(query.to_vec())) else {
            return Ok(Vec::new());
        };

        let ranked: Vec<(i64, f64)> = {
            let mat = self.embedding_matrix.lock();
            if mat.matrix.nrows() == 0 {
                return Ok(Vec::new());
            }

            // (N, dim) @ (dim,) → (N,)
            let similarities = mat.matrix.dot(&q);
            let mut scored: Vec<(i64, f64)> = similarities
                .iter()
                .zip(mat.chunk_ids.iter())
                .map(|(&s, &cid)| (cid, s as f64))
                .filter(|&(_, s)| s > score_threshold)
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(top_k);
            scored
        };

        let mut hits = Vec::with_capacity(ranked.len());
        for (chunk_id, score) in ranked {
            if let Some(chunk) = self.get_chunk(chunk_id)? {
                hits.push(SearchHit {
                    chunk_id: chunk.id,
                    doc_id: chunk.doc_id,
                    text: chunk.text,
                    score,
                    metadata: chunk.metadata,
                });
            }
        }
        Ok(hits)
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total_documents = self.count_documents()?;
        let total_chunks = self.count_chunks()?;
        let embeddings_stored = self.count("SELECT COUNT(*) FROM chunk_embeddings")?;

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let matrix_rows = self.embedding_matrix.lock().matrix.nrows();

        Ok(StoreStats {
            total_documents,
            total_chunks,
            embeddings_stored,
            embedding_dimension: self.embedding_dim,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
            matrix_rows,
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn parse_metadata(row: &rusqlite::Row<'_>) -> Option<serde_json::Value> {
        row.get::<_, Option<String>>("metadata_json")
            .ok()
            .flatten()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> Document {
        Document {
            id: row.get("id").unwrap_or(0),
            source: row.get("source").unwrap_or_default(),
            page_count: row.get("page_count").unwrap_or(0),
            metadata: Self::parse_metadata(row),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> Chunk {
        Chunk {
            id: row.get("id").unwrap_or(0),
            doc_id: row.get("doc_id").unwrap_or(0),
            text: row.get("text").unwrap_or_default(),
            chunk_index: row.get("chunk_index").unwrap_or(0),
            page: row.get("page").ok().flatten(),
            metadata: Self::parse_metadata(row),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }
}
