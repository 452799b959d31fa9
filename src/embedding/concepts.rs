//! Concept-hash embedding, the middle tier of the chain.
//!
//! The language model names up to ten single-word concepts in the text. Each
//! concept's MD5 digest is read as four big-endian `f32` values, scaled down,
//! and written to slots `(concept * 153 + k) % dims`. Four coarse text
//! statistics are then averaged into the first four slots, so texts that
//! share concepts land near each other even without a real embedding model.

use std::sync::Arc;

use async_trait::async_trait;

use super::{EmbeddingSource, EmbeddingStrategy};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::service::ServiceError;

const CONCEPT_PROMPT: &str = "Extract 10 key semantic concepts from the text. \
Return only comma-separated single words representing the main concepts, topics, and entities.";

/// Characters of the input shown to the model.
const PROMPT_CHARS: usize = 500;
const MAX_CONCEPTS: usize = 10;
/// Slot stride between consecutive concepts.
const CONCEPT_STRIDE: usize = 153;
/// Raw digest floats are divided by this before clamping.
const VALUE_SCALE: f32 = 1e6;

pub struct ConceptEmbedding {
    llm: Arc<dyn CompletionClient>,
    dims: usize,
    max_tokens: u32,
}

impl ConceptEmbedding {
    pub fn new(llm: Arc<dyn CompletionClient>, dims: usize, max_tokens: u32) -> Self {
        Self {
            llm,
            dims,
            max_tokens,
        }
    }
}

#[async_trait]
impl EmbeddingStrategy for ConceptEmbedding {
    fn source(&self) -> EmbeddingSource {
        EmbeddingSource::Concepts
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let excerpt: String = text.chars().take(PROMPT_CHARS).collect();
        let user = format!("Text: {}...", excerpt);
        let reply = self
            .llm
            .complete(&CompletionRequest {
                system: CONCEPT_PROMPT,
                user: &user,
                temperature: None,
                max_tokens: self.max_tokens,
            })
            .await?;

        let concepts = parse_concepts(&reply);
        if concepts.is_empty() {
            return Err(ServiceError::Malformed(format!(
                "no concepts in model reply: {:?}",
                reply
            )));
        }

        Ok(concept_vector(&concepts, text, self.dims))
    }
}

/// Splits a comma-separated reply into at most ten lowercase concepts.
pub fn parse_concepts(reply: &str) -> Vec<String> {
    reply
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .take(MAX_CONCEPTS)
        .collect()
}

/// Builds the concept-hash vector for `text`.
pub fn concept_vector(concepts: &[String], text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    if dims == 0 {
        return vector;
    }

    for (i, concept) in concepts.iter().take(MAX_CONCEPTS).enumerate() {
        let digest = md5::compute(concept.as_bytes());
        for (j, group) in digest.0.chunks_exact(4).enumerate() {
            let raw = f32::from_be_bytes([group[0], group[1], group[2], group[3]]);
            let pos = (i * CONCEPT_STRIDE + j) % dims;
            vector[pos] = scale_component(raw);
        }
    }

    for (slot, feature) in vector.iter_mut().zip(text_features(text)) {
        *slot = (*slot + feature) / 2.0;
    }

    vector
}

/// Scales a raw digest float into `[-1, 1]`. NaN saturates to `1.0`, so
/// vectors stay identical to ones produced by existing indexes.
fn scale_component(raw: f32) -> f32 {
    if raw.is_nan() {
        return 1.0;
    }
    (raw / VALUE_SCALE).clamp(-1.0, 1.0)
}

/// Length (per thousand chars), space ratio, uppercase ratio, digit ratio.
fn text_features(text: &str) -> [f32; 4] {
    let total = text.chars().count();
    if total == 0 {
        return [0.0; 4];
    }

    let mut spaces = 0usize;
    let mut upper = 0usize;
    let mut digits = 0usize;
    for c in text.chars() {
        if c == ' ' {
            spaces += 1;
        }
        if c.is_uppercase() {
            upper += 1;
        }
        if c.is_ascii_digit() {
            digits += 1;
        }
    }

    let n = total as f32;
    [
        n / 1000.0,
        spaces as f32 / n,
        upper as f32 / n,
        digits as f32 / n,
    ]
}
