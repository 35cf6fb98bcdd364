//! Question answering over department indexes.
//!
//! [`Assistant::answer_question`] resolves the department index, retrieves the
//! top chunks, and asks the generation model for a role-aware answer.
//! [`KnowledgeBase`] covers the admin side: documents and invalidation.

pub mod admin;
pub mod composer;
pub mod generator;
pub mod orchestrator;
pub mod prompt;

pub use admin::KnowledgeBase;
pub use composer::AnswerComposer;
pub use generator::ChatCompletionsGenerator;
pub use orchestrator::{model_config, Assistant};
pub use prompt::sample_questions;
