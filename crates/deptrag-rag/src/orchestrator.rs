use anyhow::Result;
use deptrag_core::chunker::{ChunkingConfig, TextSplitter};
use deptrag_core::config::Settings;
use deptrag_core::loader::{validate_name, DocumentLoader};
use deptrag_core::model_config::JsonModelConfig;
use deptrag_core::types::{Answer, Chunk, QueryContext};
use deptrag_embed::get_default_embedder;
use deptrag_vector::{retrieve, IndexStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::admin::KnowledgeBase;
use crate::composer::AnswerComposer;
use crate::generator::ChatCompletionsGenerator;

/// The single entry point the chat side calls.
///
/// Safe to share across tasks: departments never block each other, and
/// every expected failure comes back as an [`Answer`].
pub struct Assistant {
    store: Arc<IndexStore>,
    composer: AnswerComposer,
    top_k: usize,
}

impl Assistant {
    pub fn new(store: Arc<IndexStore>, composer: AnswerComposer, top_k: usize) -> Self {
        Self { store, composer, top_k: top_k.max(1) }
    }

    /// Wires the production services described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding)?;
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size: settings.retrieval.chunk_size,
            chunk_overlap: settings.retrieval.chunk_overlap,
        })?;
        let loader = DocumentLoader::new(&settings.paths.upload_dir, &settings.retrieval.general_department);
        let store = Arc::new(IndexStore::new(&settings.paths.vector_dir, loader, splitter, embedder));

        let generator = Arc::new(ChatCompletionsGenerator::from_settings(&settings.generation)?);
        let models = Arc::new(model_config(settings));
        let composer = AnswerComposer::new(generator, models, Duration::from_secs(settings.generation.timeout_secs));
        Ok(Self::new(store, composer, settings.retrieval.top_k))
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Admin operations sharing this assistant's upload root and build locks.
    pub fn knowledge_base(&self) -> KnowledgeBase {
        KnowledgeBase::new(self.store.loader().clone(), Arc::clone(self.store.registry()))
    }

    pub async fn answer_question(&self, department: &str, question: &str, role: &str) -> Answer {
        let ctx = QueryContext::new(department, question, role);
        if let Err(e) = validate_name("department", department) {
            warn!(department, error = %e, "rejecting question");
            return Answer::no_documents();
        }

        let index = match self.store.load_index(department).await {
            Ok(Some(index)) => index,
            Ok(None) => {
                info!(department, "no documents indexed");
                return Answer::no_documents();
            }
            Err(e) => {
                error!(department, question, error = %e, "index unavailable");
                return Answer::no_documents();
            }
        };

        let hits = match retrieve(&index, self.store.embedder().as_ref(), question, self.top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                error!(department, question, error = %e, "retrieval failed");
                return Answer::technical_issue();
            }
        };
        let chunks: Vec<Chunk> = hits.into_iter().map(|h| h.chunk).collect();
        self.composer.compose_answer(&chunks, &ctx).await
    }
}

/// The admin-editable model selection backed by `paths.model_config`.
pub fn model_config(settings: &Settings) -> JsonModelConfig {
    JsonModelConfig::new(
        &settings.paths.model_config,
        &settings.generation.default_model,
        settings.generation.available_models.clone(),
    )
}
