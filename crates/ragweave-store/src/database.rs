//! Database connection and table management.
//!
//! Provides a unified interface for LanceDB operations over the
//! documents and chunks tables.

use crate::error::Result;
use crate::schema;
use crate::schema_arrow;
use arrow_array::RecordBatchIterator;
use lancedb::connection::Connection;
use std::path::Path;

/// Main database handle. `embedding_dim` is fixed at open time and
/// governs the chunks table's vector column width.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
    path: String,
    embedding_dim: usize,
}

impl Database {
    /// Open or create a database at the specified path.
    pub async fn open(path: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        if !path.as_ref().exists() {
            std::fs::create_dir_all(path.as_ref())?;
        }

        let conn = lancedb::connect(&path_str).execute().await?;

        Ok(Self { conn, path: path_str, embedding_dim })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Create the documents and chunks tables if they don't already
    /// exist.
    pub async fn initialize(&self) -> Result<()> {
        if !self.table_exists(schema::TABLE_DOCUMENTS).await? {
            self.create_documents_table().await?;
        }
        if !self.table_exists(schema::TABLE_CHUNKS).await? {
            self.create_chunks_table().await?;
        }
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let tables = self.conn.table_names().execute().await?;
        Ok(tables.contains(&name.to_string()))
    }

    async fn create_documents_table(&self) -> Result<()> {
        let schema = schema_arrow::document_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_DOCUMENTS, empty_iter).execute().await?;
        Ok(())
    }

    async fn create_chunks_table(&self) -> Result<()> {
        let schema = schema_arrow::chunk_schema(self.embedding_dim);
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_CHUNKS, empty_iter).execute().await?;
        Ok(())
    }

    /// Create a vector index on the chunks table for approximate nearest
    /// neighbor search.
    pub async fn create_vector_index(&self) -> Result<()> {
        let table = self.conn.open_table(schema::TABLE_CHUNKS).execute().await?;
        table.create_index(&["embedding"], lancedb::index::Index::Auto).execute().await?;
        Ok(())
    }

    pub async fn optimize(&self) -> Result<()> {
        let tables = self.conn.table_names().execute().await?;
        for table_name in tables {
            let table = self.conn.open_table(&table_name).execute().await?;
            table.optimize(lancedb::table::OptimizeAction::default()).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let documents = if self.table_exists(schema::TABLE_DOCUMENTS).await? {
            let table = self.conn.open_table(schema::TABLE_DOCUMENTS).execute().await?;
            table.count_rows(None).await? as u64
        } else {
            0
        };

        let chunks = if self.table_exists(schema::TABLE_CHUNKS).await? {
            let table = self.conn.open_table(schema::TABLE_CHUNKS).execute().await?;
            table.count_rows(None).await? as u64
        } else {
            0
        };

        Ok(DatabaseStats { documents, chunks })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub documents: u64,
    pub chunks: u64,
}
