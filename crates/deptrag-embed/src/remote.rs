use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use deptrag_core::config::EmbeddingSettings;
use deptrag_core::traits::Embedder;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint
/// (Gemini's OpenAI surface by default).
pub struct RemoteEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
    batch_size: usize,
    id: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building embeddings HTTP client")?;
        // Empty `api_key_env` means an unauthenticated (local) endpoint.
        let api_key = if settings.api_key_env.is_empty() {
            None
        } else {
            let key = std::env::var(&settings.api_key_env)
                .map_err(|_| anyhow!("{} is not set; the embedding service needs an API key", settings.api_key_env))?;
            Some(key)
        };
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            dim: settings.dimension,
            batch_size: settings.batch_size.max(1),
            id: format!("remote:{}:d{}", settings.model, settings.dimension),
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await.context("embeddings request failed")?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("embeddings endpoint returned {status}: {text}");
        }
        let payload = res.text().await?;
        parse_embeddings(&payload, inputs.len(), self.dim)
    }
}

/// Parses an `/embeddings` response body, restoring input order and
/// normalising every vector.
pub fn parse_embeddings(body: &str, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    let response: EmbeddingsResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("malformed embeddings response: {e}"))?;
    let mut items = response.data;
    ensure!(
        items.len() == expected,
        "embeddings response has {} vectors for {} inputs",
        items.len(),
        expected
    );
    if items.iter().all(|i| i.index.is_some()) {
        items.sort_by_key(|i| i.index);
    }
    items
        .into_iter()
        .map(|item| {
            let mut v = item.embedding;
            ensure!(v.len() == dim, "embedding has {} dims, expected {}", v.len(), dim);
            crate::l2_normalize(&mut v);
            Ok(v)
        })
        .collect()
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, inputs = batch.len(), "requesting embeddings");
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}
