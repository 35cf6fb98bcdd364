//! Prompt template for department/role-aware answers.

use deptrag_core::types::{Chunk, QueryContext};

/// Keeps answers grounded in retrieved context and phrased for the asker's
/// role. Placeholders: `{role}`, `{department}`, `{context}`, `{question}`.
macro_rules! answer_template {
    () => {
        concat!(
            "You are a friendly and helpful onboarding assistant. Your goal is to help employees ",
            "get the information they need in a welcoming, natural, and conversational tone.\n\n",
            "The person asking works in the {department} department as a {role}.\n\n",
            "Use the following pieces of context from the knowledge base to answer their question.\n\n",
            "CONTEXT:\n{context}\n\n",
            "QUESTION:\n{question}\n\n",
            "INSTRUCTIONS:\n",
            "- Answer the question based *only* on the context provided.\n",
            "- Answer from the perspective of a {role} in the {department} department, focusing on what matters for that role.\n",
            "- Do not mention that you are answering based on the context. Just answer the question directly and conversationally.\n",
            "- If the information is not in the context, politely say that you don't have information on that topic ",
            "and suggest they ask another question or contact their manager.\n",
            "- Keep a friendly, professional tone, as if speaking directly to a colleague.\n",
            "- Except at the beginning of the chat, avoid giving excessive greetings.\n\n",
            "FRIENDLY ANSWER:\n"
        )
    };
}

/// Retrieved chunk texts, in retrieval order, separated by blank lines.
pub fn render_context(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

pub fn render_prompt(chunks: &[Chunk], ctx: &QueryContext) -> String {
    format!(
        answer_template!(),
        role = ctx.role,
        department = ctx.department,
        context = render_context(chunks),
        question = ctx.question,
    )
}

/// Starter questions offered at the top of a chat.
pub fn sample_questions(role: &str) -> [String; 3] {
    [
        "What are the company's working hours?".to_string(),
        "How do I request vacation time?".to_string(),
        format!("Regarding my role as a {role}, what are my key responsibilities?"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, source: &str) -> Chunk {
        Chunk { content: text.into(), source_id: source.into(), chunk_index: 0 }
    }

    #[test]
    fn prompt_carries_role_department_context_and_question() {
        let ctx = QueryContext::new("finance", "When are invoices paid?", "AP/AR Officer");
        let chunks = [chunk("Invoices are paid on Fridays.", "finance/ap.txt"), chunk("Net 30 terms.", "general/terms.txt")];
        let prompt = render_prompt(&chunks, &ctx);
        assert!(prompt.contains("finance department as a AP/AR Officer"));
        assert!(prompt.contains("Invoices are paid on Fridays.\n\nNet 30 terms."));
        assert!(prompt.contains("QUESTION:\nWhen are invoices paid?"));
        assert!(prompt.contains("contact their manager"));
    }

    #[test]
    fn braces_in_user_text_are_not_placeholders() {
        let ctx = QueryContext::new("it", "What is {context}?", "Junior IT Support");
        let prompt = render_prompt(&[chunk("json {\"a\": 1}", "it/x.txt")], &ctx);
        assert!(prompt.contains("What is {context}?"));
        assert!(prompt.contains("json {\"a\": 1}"));
    }

    #[test]
    fn role_question_names_the_role() {
        let q = sample_questions("Inventory Clerk");
        assert_eq!(q[2], "Regarding my role as a Inventory Clerk, what are my key responsibilities?");
    }
}
