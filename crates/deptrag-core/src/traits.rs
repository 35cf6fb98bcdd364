use async_trait::async_trait;

/// Text → dense vector service.
///
/// Implementations return L2-normalised vectors of `dim()` length. The
/// `embedder_id` is persisted next to an index so that vectors from a
/// different model are never mixed with the current one.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

/// Prompt → generated text service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}

/// Resolves which generation model to use. Called once per answer, right
/// before generation, so an admin change applies to the next question.
pub trait ModelSelector: Send + Sync {
    fn current_model(&self) -> String;
}
