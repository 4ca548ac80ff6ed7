//! Arrow schema and record-batch conversion for the two tables the store
//! keeps: documents and chunks. The embedding dimension is a parameter
//! rather than a compile-time constant, since it depends on whichever
//! provider produced the vectors for a given store instance.

use crate::error::{Result, StoreError};
use ragweave_common::{Document, DocumentChunk};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

// =============================================================================
// Document Arrow conversion
// =============================================================================

pub fn document_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("owner_id", DataType::Utf8, false),
        Field::new("file_name", DataType::Utf8, false),
        Field::new("content_type", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("language", DataType::Utf8, true),
        Field::new("chunk_ids", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("uploaded_at", DataType::Utf8, false),
    ]))
}

pub fn document_to_record(doc: &Document) -> Result<RecordBatch> {
    let schema = document_schema();

    let id = StringArray::from(vec![doc.id.to_string()]);
    let owner_id = StringArray::from(vec![doc.owner_id.as_str()]);
    let file_name = StringArray::from(vec![doc.file_name.as_str()]);
    let content_type = StringArray::from(vec![doc.content_type.as_str()]);
    let content_hash = StringArray::from(vec![doc.content_hash.as_str()]);
    let language = StringArray::from(vec![doc.language.as_deref()]);
    let chunk_ids = StringArray::from(vec![serde_json::to_string(&doc.chunk_ids)?]);
    let metadata = StringArray::from(vec![serde_json::to_string(&doc.metadata)?]);
    let uploaded_at = StringArray::from(vec![doc.uploaded_at.to_rfc3339()]);

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(id) as Arc<dyn Array>,
            Arc::new(owner_id),
            Arc::new(file_name),
            Arc::new(content_type),
            Arc::new(content_hash),
            Arc::new(language),
            Arc::new(chunk_ids),
            Arc::new(metadata),
            Arc::new(uploaded_at),
        ],
    )
    .map_err(StoreError::from)
}

pub fn record_to_document(batch: &RecordBatch, row: usize) -> Result<Document> {
    let get_string = |col: usize| -> String {
        batch.column(col).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string()
    };
    let get_opt_string = |col: usize| -> Option<String> {
        let arr = batch.column(col).as_any().downcast_ref::<StringArray>().unwrap();
        if arr.is_null(row) { None } else { Some(arr.value(row).to_string()) }
    };

    Ok(Document {
        id: uuid::Uuid::parse_str(&get_string(0)).map_err(|e| StoreError::InvalidQuery(e.to_string()))?,
        owner_id: get_string(1),
        file_name: get_string(2),
        content_type: get_string(3),
        content_hash: get_string(4),
        language: get_opt_string(5),
        raw_content: None,
        chunk_ids: serde_json::from_str(&get_string(6))?,
        metadata: serde_json::from_str(&get_string(7))?,
        uploaded_at: chrono::DateTime::parse_from_rfc3339(&get_string(8))
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

// =============================================================================
// Chunk Arrow conversion
// =============================================================================

pub fn chunk_schema(embedding_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int64, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), embedding_dim as i32),
            true,
        ),
    ]))
}

pub fn chunk_to_record(chunk: &DocumentChunk, embedding_dim: usize) -> Result<RecordBatch> {
    let schema = chunk_schema(embedding_dim);

    let id = StringArray::from(vec![chunk.id.to_string()]);
    let document_id = StringArray::from(vec![chunk.document_id.to_string()]);
    let chunk_index = Int64Array::from(vec![chunk.index]);
    let content = StringArray::from(vec![chunk.content.as_str()]);
    let metadata = StringArray::from(vec![serde_json::to_string(&chunk.metadata)?]);
    let created_at = StringArray::from(vec![chunk.created_at.to_rfc3339()]);

    let embedding: Arc<dyn Array> = if let Some(ref emb) = chunk.embedding {
        if emb.len() != embedding_dim {
            return Err(StoreError::InvalidEmbeddingDimension { expected: embedding_dim, actual: emb.len() });
        }
        let values = Float32Array::from(emb.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        Arc::new(FixedSizeListArray::try_new(field, embedding_dim as i32, Arc::new(values), None)?)
    } else {
        Arc::new(FixedSizeListArray::new_null(
            Arc::new(Field::new("item", DataType::Float32, false)),
            embedding_dim as i32,
            1,
        ))
    };

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(id) as Arc<dyn Array>,
            Arc::new(document_id),
            Arc::new(chunk_index),
            Arc::new(content),
            Arc::new(metadata),
            Arc::new(created_at),
            embedding,
        ],
    )
    .map_err(StoreError::from)
}

pub fn record_to_chunk(batch: &RecordBatch, row: usize) -> Result<DocumentChunk> {
    let get_string = |col: usize| -> String {
        batch.column(col).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string()
    };
    let get_i64 = |col: usize| -> i64 {
        batch.column(col).as_any().downcast_ref::<Int64Array>().unwrap().value(row)
    };
    let get_embedding = |col: usize| -> Option<Vec<f32>> {
        let arr = batch.column(col);
        if arr.is_null(row) {
            return None;
        }
        let list_arr = arr.as_any().downcast_ref::<FixedSizeListArray>().unwrap();
        if list_arr.is_null(row) {
            return None;
        }
        let values = list_arr.value(row);
        let float_arr = values.as_any().downcast_ref::<Float32Array>().unwrap();
        Some(float_arr.values().to_vec())
    };

    Ok(DocumentChunk {
        id: uuid::Uuid::parse_str(&get_string(0)).map_err(|e| StoreError::InvalidQuery(e.to_string()))?,
        document_id: uuid::Uuid::parse_str(&get_string(1)).map_err(|e| StoreError::InvalidQuery(e.to_string()))?,
        index: get_i64(2),
        content: get_string(3),
        metadata: serde_json::from_str(&get_string(4))?,
        created_at: chrono::DateTime::parse_from_rfc3339(&get_string(5))
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        embedding: get_embedding(6),
    })
}
