use anyhow::{anyhow, bail, Result};
use arrow_array::{Float32Array, Int32Array};
use deptrag_core::traits::Embedder;
use deptrag_core::types::{Chunk, SearchHit};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;

use crate::schema::{CHUNKS_TABLE, META_TABLE};
use crate::table::{has_table, open_db, read_meta, string_column, IndexMeta};

/// A loaded, queryable department index.
pub struct DepartmentIndex {
    table: Table,
    meta: IndexMeta,
}

impl DepartmentIndex {
    /// Opens the index persisted at `path`. Fails when either table is
    /// missing or the metadata cannot be read.
    pub async fn open(path: &Path, department: &str) -> Result<Self> {
        let conn = open_db(path).await?;
        if !has_table(&conn, CHUNKS_TABLE).await? || !has_table(&conn, META_TABLE).await? {
            bail!("no {department} index tables at {}", path.display());
        }
        let meta = read_meta(&conn)
            .await?
            .ok_or_else(|| anyhow!("{department} index metadata missing at {}", path.display()))?;
        let table = conn.open_table(CHUNKS_TABLE).execute().await?;
        Ok(Self { table, meta })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    /// Nearest chunks to `query`, most similar first. Score is `1 - distance`.
    pub async fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.meta.dimension {
            bail!("query has {} dims, index expects {}", query.len(), self.meta.dimension);
        }
        let mut stream = self
            .table
            .vector_search(query.to_vec())?
            .distance_type(DistanceType::L2)
            .limit(k)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let sources = string_column(&batch, "source")?;
            let contents = string_column(&batch, "content")?;
            let indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow!("chunk_index column missing"))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for i in 0..batch.num_rows() {
                let score = distances.map_or(0.0, |d| 1.0 - d.value(i));
                hits.push(SearchHit {
                    chunk: Chunk {
                        content: contents.value(i).to_string(),
                        source_id: sources.value(i).to_string(),
                        chunk_index: usize::try_from(indices.value(i)).unwrap_or_default(),
                    },
                    score,
                });
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Embeds `question` and returns the `k` closest chunks of `index`. No
/// relevance threshold is applied; a small index returns what it has.
pub async fn retrieve(
    index: &DepartmentIndex,
    embedder: &dyn Embedder,
    question: &str,
    k: usize,
) -> Result<Vec<SearchHit>> {
    let query = embedder.embed_query(question).await?;
    index.search_vector(&query, k).await
}
