use deptrag_core::traits::{Generator, ModelSelector};
use deptrag_core::types::{Answer, Chunk, QueryContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::prompt::render_prompt;

/// Turns retrieved chunks and a question into an [`Answer`].
///
/// Generation failures (including exceeding `timeout`) never escape: the
/// caller gets the fixed technical-issue answer and the cause is logged.
pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
    models: Arc<dyn ModelSelector>,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>, models: Arc<dyn ModelSelector>, timeout: Duration) -> Self {
        Self { generator, models, timeout }
    }

    /// Resolves the current model right before generating, so a model change
    /// applies to the very next question.
    pub async fn compose_answer(&self, chunks: &[Chunk], ctx: &QueryContext) -> Answer {
        let model = self.models.current_model();
        self.compose_with_model(chunks, ctx, &model).await
    }

    pub async fn compose_with_model(&self, chunks: &[Chunk], ctx: &QueryContext, model: &str) -> Answer {
        let prompt = render_prompt(chunks, ctx);
        info!(department = %ctx.department, model, chunks = chunks.len(), "generating answer");
        let outcome = tokio::time::timeout(self.timeout, self.generator.generate(model, &prompt)).await;
        match outcome {
            Ok(Ok(text)) => Answer::from_chunks(text.trim(), chunks),
            Ok(Err(e)) => {
                error!(department = %ctx.department, question = %ctx.question, model, error = %e, "generation failed");
                Answer::technical_issue()
            }
            Err(_) => {
                error!(
                    department = %ctx.department,
                    question = %ctx.question,
                    model,
                    timeout_secs = self.timeout.as_secs(),
                    "generation timed out"
                );
                Answer::technical_issue()
            }
        }
    }
}
