//! Question answering over the vector index.
//!
//! For each question: embed → top-k query → generate from the matched
//! chunk texts. Failures stay local to the question and surface as answer
//! text.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::answer::AnswerGenerator;
use crate::embedding::FallbackEmbedder;
use crate::index::VectorIndex;
use crate::models::QueryResult;

/// Answer returned when the index has no match at all.
pub const NO_MATCHES: &str = "No relevant information found in the document.";

const SNIPPET_CHARS: usize = 200;

pub struct QueryPipeline {
    embedder: Arc<FallbackEmbedder>,
    index: Arc<dyn VectorIndex>,
    generator: AnswerGenerator,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<FallbackEmbedder>,
        index: Arc<dyn VectorIndex>,
        generator: AnswerGenerator,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            top_k: top_k.max(1),
        }
    }

    pub async fn answer(&self, question: &str) -> QueryResult {
        let embedding = self.embedder.embed(question).await;

        let matches = match self.index.query(&embedding.vector, self.top_k).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "index query failed");
                return QueryResult {
                    answer: format!("Error processing query: {}", e),
                    confidence: 0.0,
                    source_chunks: Vec::new(),
                };
            }
        };

        let Some(best) = matches.first() else {
            return QueryResult {
                answer: NO_MATCHES.to_string(),
                confidence: 0.0,
                source_chunks: Vec::new(),
            };
        };
        let confidence = best.score;

        let mut context = Vec::with_capacity(matches.len());
        let mut sources = Vec::with_capacity(matches.len());
        for m in &matches {
            let Some(meta) = &m.metadata else { continue };
            if meta.text.is_empty() {
                continue;
            }
            sources.push(source_snippet(m.score, &meta.text));
            context.push(meta.text.clone());
        }
        debug!(
            matches = matches.len(),
            with_text = context.len(),
            confidence,
            "retrieved context"
        );

        let answer = self.generator.generate(question, &context).await;
        QueryResult {
            answer,
            confidence,
            source_chunks: sources,
        }
    }
}

fn source_snippet(score: f32, text: &str) -> String {
    let head: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("Relevance: {:.3} - {}...", score, head)
}
