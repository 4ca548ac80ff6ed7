//! Document repository.
//!
//! CRUD operations for document metadata, keyed for content-hash-based
//! deduplication instead of DOI/PMID lookups.

use crate::database::Database;
use crate::error::Result;
use crate::schema_arrow::{document_to_record, record_to_document};
use arrow_array::RecordBatchIterator;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use ragweave_common::Document;
use std::sync::Arc;

#[derive(Clone)]
pub struct DocumentRepository {
    db: Arc<Database>,
}

impl DocumentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn insert(&self, document: &Document) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let record = document_to_record(document)?;
        let schema = record.schema();
        let iter = RecordBatchIterator::new(vec![Ok(record)], schema);
        table.add(iter).execute().await?;
        Ok(())
    }

    pub async fn insert_batch(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let records: Vec<arrow_array::RecordBatch> =
            documents.iter().map(document_to_record).collect::<Result<_>>()?;
        let schema = records[0].schema();
        let iter = RecordBatchIterator::new(records.into_iter().map(Ok), schema);
        table.add(iter).execute().await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: uuid::Uuid) -> Result<Option<Document>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let mut stream = table.query().only_if(&format!("id = '{id}'")).execute().await?;
        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_document(&batch, 0)?));
            }
        }
        Ok(None)
    }

    /// Looks up a document by its exact content hash within one owner's
    /// namespace — the basis for upload deduplication.
    pub async fn find_by_content_hash(&self, owner_id: &str, content_hash: &str) -> Result<Option<Document>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let owner_escaped = owner_id.replace('\'', "''");
        let hash_escaped = content_hash.replace('\'', "''");
        let mut stream = table
            .query()
            .only_if(&format!("owner_id = '{owner_escaped}' AND content_hash = '{hash_escaped}'"))
            .execute()
            .await?;
        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_document(&batch, 0)?));
            }
        }
        Ok(None)
    }

    pub async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let escaped = owner_id.replace('\'', "''");
        let mut stream = table.query().only_if(&format!("owner_id = '{escaped}'")).execute().await?;
        let mut documents = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                documents.push(record_to_document(&batch, i)?);
            }
        }
        Ok(documents)
    }

    pub async fn update(&self, document: &Document) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let record = document_to_record(document)?;
        let schema = record.schema();
        let iter = RecordBatchIterator::new(vec![Ok(record)], schema);
        let mut builder = table.merge_insert(&["id"]);
        builder.when_matched_update_all(None);
        builder.execute(Box::new(iter)).await?;
        Ok(())
    }

    pub async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        table.delete(&format!("id = '{id}'")).await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        Ok(table.count_rows(None).await? as u64)
    }

    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_DOCUMENTS).execute().await?;
        let mut stream = table.query().limit(limit).offset(offset).execute().await?;
        let mut documents = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                documents.push(record_to_document(&batch, i)?);
            }
        }
        Ok(documents)
    }
}
