//! BGE-M3 (XLM-RoBERTa) sentence embeddings computed in-process with candle.

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use deptrag_core::traits::Embedder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use crate::tokenize::tokenize_batch;

const MAX_LEN: usize = 256;

struct BgeM3 {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BgeM3 {
    fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(path = %model_dir.display(), device = ?device, "loading BGE-M3 model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?,
        )?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, MAX_LEN, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 * texts.len() as u128 {
            warn!(texts = texts.len(), elapsed_ms = elapsed.as_millis(), "slow embedding batch");
        }
        Ok(vectors)
    }
}

/// Mean of the token states kept by the attention mask, scaled to unit length.
/// `hidden` is `[batch, tokens, dim]`, `mask` is `[batch, tokens]`.
pub fn masked_mean_l2(hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let (batch, _, dim) = hidden.dims3()?;
    let mask = mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let mean = summed.broadcast_div(&mask.sum_keepdim(1)?)?;
    let norms = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + 1e-12)?;
    let pooled = mean.broadcast_div(&norms)?;
    ensure!(pooled.dims() == [batch, dim].as_slice(), "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => return device,
            Err(e) => warn!(error = %e, "Metal unavailable, embedding on CPU"),
        }
    }
    Device::Cpu
}

/// In-process embedder. Inference runs on the blocking pool so callers on the
/// async runtime are not stalled.
pub struct LocalEmbedder {
    inner: Arc<BgeM3>,
    dim: usize,
    batch_size: usize,
    id: String,
}

impl LocalEmbedder {
    pub fn load(model_dir: Option<&Path>, dim: usize, batch_size: usize) -> Result<Self> {
        let dir = resolve_model_dir(model_dir)?;
        let inner = Arc::new(BgeM3::load(&dir)?);
        Ok(Self { inner, dim, batch_size: batch_size.max(1), id: format!("local:bge-m3:d{dim}") })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let inner = Arc::clone(&self.inner);
            let batch = batch.to_vec();
            let vectors = tokio::task::spawn_blocking(move || inner.embed_batch(&batch)).await??;
            for v in &vectors {
                ensure!(v.len() == self.dim, "model produced {} dims, expected {}", v.len(), self.dim);
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Explicit directory first, then `APP_MODEL_DIR`, `MODEL_DIR`, and finally
/// the conventional `models/bge-m3` locations.
fn resolve_model_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
        warn!(path = %p.display(), "configured model_dir does not exist");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                info!(var, path = %p.display(), "using model dir from env");
                return Ok(p);
            }
        }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
