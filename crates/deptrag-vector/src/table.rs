//! LanceDB connection helpers and the per-index metadata table.

use anyhow::{anyhow, Context, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::schema::{build_meta_schema, META_TABLE};

/// How a persisted index was produced. An index is only reused when the
/// current embedder matches `embedder_id` and `dimension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub embedder_id: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub built_at: String,
}

impl IndexMeta {
    pub fn new(embedder_id: impl Into<String>, dimension: usize, chunk_count: usize) -> Self {
        Self {
            embedder_id: embedder_id.into(),
            dimension,
            chunk_count,
            built_at: Utc::now().to_rfc3339(),
        }
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("embedder_id", self.embedder_id.clone()),
            ("dimension", self.dimension.to_string()),
            ("chunk_count", self.chunk_count.to_string()),
            ("built_at", self.built_at.clone()),
        ]
    }

    fn from_pairs(mut pairs: HashMap<String, String>) -> Result<Self> {
        let mut take = |key: &str| pairs.remove(key).ok_or_else(|| anyhow!("meta key '{key}' missing"));
        Ok(Self {
            embedder_id: take("embedder_id")?,
            dimension: take("dimension")?.parse().context("meta dimension")?,
            chunk_count: take("chunk_count")?.parse().context("meta chunk_count")?,
            built_at: take("built_at")?,
        })
    }
}

pub async fn open_db(path: &Path) -> Result<Connection> {
    Ok(connect(path.to_string_lossy().as_ref()).execute().await?)
}

pub async fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn write_meta(conn: &Connection, meta: &IndexMeta) -> Result<()> {
    let pairs = meta.to_pairs();
    let now = Utc::now().timestamp_millis();
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(pairs.iter().map(|(k, _)| *k).collect::<Vec<_>>())),
            Arc::new(StringArray::from(pairs.iter().map(|(_, v)| v.as_str()).collect::<Vec<_>>())),
            Arc::new(TimestampMillisecondArray::from(vec![now; pairs.len()])),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    conn.create_table(META_TABLE, reader).execute().await?;
    Ok(())
}

pub async fn read_meta(conn: &Connection) -> Result<Option<IndexMeta>> {
    if !has_table(conn, META_TABLE).await? {
        return Ok(None);
    }
    let t = conn.open_table(META_TABLE).execute().await?;
    let mut stream = t.query().execute().await?;
    let mut pairs = HashMap::new();
    while let Some(batch) = stream.try_next().await? {
        let keys = string_column(&batch, "key")?;
        let values = string_column(&batch, "value")?;
        for i in 0..batch.num_rows() {
            pairs.insert(keys.value(i).to_string(), values.value(i).to_string());
        }
    }
    IndexMeta::from_pairs(pairs).map(Some)
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}
