//! Domain types shared by the loader, the index and the answer pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shown when a department has no documents and therefore no index.
pub const NO_DOCUMENTS_MESSAGE: &str =
    "Sorry, I couldn't find any documents for this department. Please contact an admin.";

/// Shown when the embedding or generation service fails mid-answer.
pub const TECHNICAL_ISSUE_MESSAGE: &str =
    "Sorry, it seems there's a technical issue. Please try again later.";

/// One text file read from an upload folder.
///
/// `source_id` is `"<folder>/<file_name>"` and is what end users see as a
/// citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source_id: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self { content: content.into(), source_id: source_id.into() }
    }
}

/// A bounded window of a single [`Document`]; the unit of embedding and retrieval.
///
/// `chunk_index` is the position within the parent document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_id: String,
    pub chunk_index: usize,
}

/// A retrieved chunk with its similarity score. Higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// The inputs of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub question: String,
    pub department: String,
    pub role: String,
}

impl QueryContext {
    pub fn new(
        department: impl Into<String>,
        question: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self { question: question.into(), department: department.into(), role: role.into() }
    }
}

/// What the chat collaborator receives: answer text plus distinct citations in
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

impl Answer {
    /// Builds an answer citing the given chunks. Duplicate sources are dropped.
    pub fn from_chunks(text: impl Into<String>, chunks: &[Chunk]) -> Self {
        Self { text: text.into(), sources: distinct_sources(chunks.iter().map(|c| c.source_id.as_str())) }
    }

    pub fn without_sources(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new() }
    }

    pub fn no_documents() -> Self {
        Self::without_sources(NO_DOCUMENTS_MESSAGE)
    }

    pub fn technical_issue() -> Self {
        Self::without_sources(TECHNICAL_ISSUE_MESSAGE)
    }
}

/// Deduplicates source ids keeping the first occurrence of each.
pub fn distinct_sources<'a, I>(sources: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: usize) -> Chunk {
        Chunk { content: format!("{source} #{index}"), source_id: source.to_string(), chunk_index: index }
    }

    #[test]
    fn sources_keep_first_seen_order_without_duplicates() {
        let chunks = vec![
            chunk("hr/leave.txt", 0),
            chunk("general/policy.txt", 0),
            chunk("hr/leave.txt", 1),
            chunk("general/policy.txt", 3),
        ];
        let answer = Answer::from_chunks("ok", &chunks);
        assert_eq!(answer.sources, vec!["hr/leave.txt", "general/policy.txt"]);
    }

    #[test]
    fn fallback_answers_have_no_sources() {
        assert!(Answer::no_documents().sources.is_empty());
        assert_eq!(Answer::technical_issue().text, TECHNICAL_ISSUE_MESSAGE);
    }
}
