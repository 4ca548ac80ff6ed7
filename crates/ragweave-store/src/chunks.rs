//! LanceDB-backed `ChunkStore` implementation.

use crate::chunk_store::ChunkStore;
use crate::database::Database;
use crate::error::StoreError;
use crate::schema_arrow::{chunk_to_record, record_to_chunk};
use arrow_array::RecordBatchIterator;
use async_trait::async_trait;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use ragweave_common::{DocumentChunk, RagError};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct LanceChunkStore {
    db: Arc<Database>,
}

impl LanceChunkStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> crate::error::Result<Option<DocumentChunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;
        let mut stream = table.query().only_if(&format!("id = '{id}'")).execute().await?;
        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_chunk(&batch, 0)?));
            }
        }
        Ok(None)
    }

    pub async fn count(&self) -> crate::error::Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;
        Ok(table.count_rows(None).await? as u64)
    }

    pub async fn list(&self, offset: usize, limit: usize) -> crate::error::Result<Vec<DocumentChunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;
        let mut stream = table.query().limit(limit).offset(offset).execute().await?;
        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i)?);
            }
        }
        Ok(chunks)
    }
}

#[async_trait]
impl ChunkStore for LanceChunkStore {
    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), RagError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let dim = self.db.embedding_dim();
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await.map_err(StoreError::from)?;

        // merge_insert upserts: replace an existing row by id, add a new one otherwise.
        let records: Vec<arrow_array::RecordBatch> =
            chunks.iter().map(|c| chunk_to_record(c, dim)).collect::<crate::error::Result<_>>().map_err(RagError::from)?;
        let schema = records[0].schema();
        let iter = RecordBatchIterator::new(records.into_iter().map(Ok), schema);

        let mut builder = table.merge_insert(&["id"]);
        builder.when_matched_update_all(None);
        builder.when_not_matched_insert_all();
        builder.execute(Box::new(iter)).await.map_err(|e| RagError::from(StoreError::from(e)))?;
        Ok(())
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), RagError> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await.map_err(StoreError::from)?;
        table.delete(&format!("document_id = '{document_id}'")).await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn top_k(&self, query_vec: &[f32], k: usize, filter: Option<&str>) -> Result<Vec<(Uuid, f64)>, RagError> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await.map_err(StoreError::from)?;
        let mut query = table.vector_search(query_vec.to_vec()).map_err(StoreError::from)?.distance_type(DistanceType::Cosine).limit(k);
        if let Some(f) = filter {
            query = query.only_if(f);
        }
        let mut stream = query.execute().await.map_err(StoreError::from)?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(StoreError::from)?;
            for i in 0..batch.num_rows() {
                let chunk = record_to_chunk(&batch, i).map_err(RagError::from)?;
                let distance_col = batch.column_by_name("_distance");
                let score = distance_col
                    .and_then(|c| c.as_any().downcast_ref::<arrow_array::Float32Array>())
                    .map(|a| 1.0 - a.value(i) as f64)
                    .unwrap_or(0.0);
                hits.push((chunk.id, score));
            }
        }
        Ok(hits)
    }

    async fn get_chunks(&self, ids: &[Uuid]) -> Result<Vec<DocumentChunk>, RagError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = self.find_by_id(*id).await.map_err(RagError::from)? {
                out.push(chunk);
            }
        }
        Ok(out)
    }

    async fn get_all(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>, RagError> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await.map_err(StoreError::from)?;
        let mut stream = table
            .query()
            .only_if(&format!("document_id = '{document_id}'"))
            .execute()
            .await
            .map_err(StoreError::from)?;
        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(StoreError::from)?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i).map_err(RagError::from)?);
            }
        }
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }
}
