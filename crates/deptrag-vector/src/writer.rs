use anyhow::{ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::ArrowError;
use deptrag_core::types::Chunk;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::schema::{build_chunk_schema, CHUNKS_TABLE};
use crate::table::{open_db, write_meta, IndexMeta};

const BATCH_SIZE: usize = 1000;

/// Stable id for a chunk: blake3 over source, position and text.
pub fn chunk_id(chunk: &Chunk) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(chunk.source_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(chunk.chunk_index.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(chunk.content.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Writes a complete index (chunks table + meta table) into `dir`, which must
/// not already hold one.
pub async fn write_index(dir: &Path, chunks: &[Chunk], embeddings: &[Vec<f32>], meta: &IndexMeta) -> Result<()> {
    ensure!(!chunks.is_empty(), "refusing to write an empty index");
    ensure!(
        chunks.len() == embeddings.len(),
        "chunks ({}) and embeddings ({}) length must match",
        chunks.len(),
        embeddings.len()
    );
    let dim = i32::try_from(meta.dimension)?;
    for v in embeddings {
        ensure!(v.len() == meta.dimension, "embedding has {} dims, expected {}", v.len(), meta.dimension);
    }

    let schema = build_chunk_schema(dim);
    let batches = chunks
        .chunks(BATCH_SIZE)
        .zip(embeddings.chunks(BATCH_SIZE))
        .map(|(c, e)| to_record_batch(c, e, dim))
        .collect::<Result<Vec<_>>>()?;
    let reader = Box::new(RecordBatchIterator::new(
        batches.into_iter().map(Ok::<_, ArrowError>),
        schema,
    ));

    let conn = open_db(dir).await?;
    conn.create_table(CHUNKS_TABLE, reader).execute().await?;
    write_meta(&conn, meta).await?;
    debug!(path = %dir.display(), chunks = chunks.len(), "index written");
    Ok(())
}

fn to_record_batch(chunks: &[Chunk], embeddings: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
    let ids: Vec<String> = chunks.iter().map(chunk_id).collect();
    let sources: Vec<&str> = chunks.iter().map(|c| c.source_id.as_str()).collect();
    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let indices = chunks
        .iter()
        .map(|c| i32::try_from(c.chunk_index))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let vectors = embeddings.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));

    Ok(RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(Int32Array::from(indices)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
        ],
    )?)
}
