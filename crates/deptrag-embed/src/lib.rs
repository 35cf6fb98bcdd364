//! Embedding backends for the retrieval pipeline.
//!
//! - `remote`: OpenAI-compatible HTTP embeddings (default).
//! - `local`: BGE-M3 in-process via candle.
//! - `fake`: deterministic hashing embedder for tests.
//!
//! All backends return L2-normalised vectors.

pub mod fake;
pub mod local;
pub mod remote;
pub mod tokenize;

use deptrag_core::config::{EmbeddingProvider, EmbeddingSettings};
use deptrag_core::traits::Embedder;
use std::sync::Arc;
use tracing::info;

pub use fake::FakeEmbedder;
pub use local::{masked_mean_l2, LocalEmbedder};
pub use remote::RemoteEmbedder;

/// Builds the embedder selected by configuration. `APP_USE_FAKE_EMBEDDINGS=1`
/// forces the fake backend regardless of provider.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> anyhow::Result<Arc<dyn Embedder>> {
    let force_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let provider = if force_fake { EmbeddingProvider::Fake } else { settings.provider };
    let embedder: Arc<dyn Embedder> = match provider {
        EmbeddingProvider::Fake => Arc::new(FakeEmbedder::new(settings.dimension)),
        EmbeddingProvider::Local => Arc::new(LocalEmbedder::load(
            settings.model_dir.as_deref(),
            settings.dimension,
            settings.batch_size,
        )?),
        EmbeddingProvider::Remote => Arc::new(RemoteEmbedder::from_settings(settings)?),
    };
    info!(embedder = embedder.embedder_id(), "embedder ready");
    Ok(embedder)
}

/// Scales `v` to unit length in place. Zero vectors are left as is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
