//! Grounded answer generation.
//!
//! Builds a context-constrained prompt from retrieved chunks and asks the
//! completion model for an answer. Generation never fails outward: a model
//! error becomes the answer text so sibling questions are unaffected.

use std::sync::Arc;

use crate::llm::{CompletionClient, CompletionRequest};

/// Reply the model is told to give when the context lacks the answer.
pub const NOT_AVAILABLE: &str = "The information is not available in the provided document";

const CONTEXT_SEPARATOR: &str = "\n---\n";

fn system_prompt() -> String {
    format!(
        "You are a precise document analyst. Answer the question using only the \
         provided context from the document.\n\
         Rules:\n\
         1. Use only information that appears in the context.\n\
         2. If the answer is not in the context, reply exactly: \"{}\".\n\
         3. Quote specific figures, dates, conditions and clause wording where relevant.\n\
         4. Do not speculate or add outside knowledge.",
        NOT_AVAILABLE
    )
}

/// Formats the user prompt for one question.
pub fn build_prompt(question: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join(CONTEXT_SEPARATOR);
    format!(
        "Context from document:\n---\n{}\n---\n\nQuestion: {}\n\nAnswer:",
        context, question
    )
}

pub struct AnswerGenerator {
    llm: Arc<dyn CompletionClient>,
    temperature: f32,
    max_tokens: u32,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn CompletionClient>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            llm,
            temperature,
            max_tokens,
        }
    }

    pub async fn generate(&self, question: &str, context_chunks: &[String]) -> String {
        let system = system_prompt();
        let user = build_prompt(question, context_chunks);
        let request = CompletionRequest {
            system: &system,
            user: &user,
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
        };

        match self.llm.complete(&request).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "answer generation failed");
                format!("Error generating answer: {}", e)
            }
        }
    }
}
