//! Embedding provider with a cascading fallback chain.
//!
//! Text is embedded by the first tier that succeeds:
//!
//! 1. **[`RemoteEmbedding`]**: an OpenAI-compatible `/embeddings` endpoint.
//! 2. **[`ConceptEmbedding`]**: asks the language model for key concepts and
//!    hashes them into fixed vector positions (see [`concepts`]).
//! 3. **[`HashEmbedding`]**: SHA-256 of the text spread over the vector;
//!    infallible and deterministic (see [`hash`]).
//!
//! Fallible tiers implement [`EmbeddingStrategy`] and report failures as
//! [`ServiceError`]; the [`FallbackEmbedder`] logs each failure and moves on.
//! The final tier is not a strategy at all but a plain function, so the
//! chain as a whole cannot fail. Retrieval quality degrades with each tier,
//! and callers must not assume which tier produced a vector.
//!
//! # Example
//!
//! ```rust
//! use docqa::embedding::{EmbeddingSource, FallbackEmbedder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let embedder = FallbackEmbedder::hash_only(1536);
//! let e = embedder.embed("coverage starts after 30 days").await;
//! assert_eq!(e.vector.len(), 1536);
//! assert_eq!(e.source, EmbeddingSource::Hash);
//! # }
//! ```

pub mod concepts;
pub mod hash;

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::OpenAiClient;
use crate::service::ServiceError;

pub use concepts::ConceptEmbedding;
pub use hash::HashEmbedding;

/// Dimensionality of the default embedding model (`text-embedding-3-small`).
pub const DEFAULT_DIMS: usize = 1536;

/// Which tier of the chain produced a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    Remote,
    Concepts,
    Hash,
}

impl EmbeddingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingSource::Remote => "remote",
            EmbeddingSource::Concepts => "concepts",
            EmbeddingSource::Hash => "hash",
        }
    }
}

/// A vector together with the tier that produced it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub source: EmbeddingSource,
}

/// One fallible tier of the embedding chain.
#[async_trait]
pub trait EmbeddingStrategy: Send + Sync {
    /// The tier this strategy represents.
    fn source(&self) -> EmbeddingSource;

    /// Embed `text`, or report why this tier could not.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

// ============ Remote tier ============

/// Remote embedding model behind an OpenAI-compatible API.
pub struct RemoteEmbedding {
    client: Arc<OpenAiClient>,
    model: String,
    dims: usize,
}

impl RemoteEmbedding {
    pub fn new(client: Arc<OpenAiClient>, model: String, dims: usize) -> Self {
        Self {
            client,
            model,
            dims,
        }
    }
}

#[async_trait]
impl EmbeddingStrategy for RemoteEmbedding {
    fn source(&self) -> EmbeddingSource {
        EmbeddingSource::Remote
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let vector = self.client.embed(&self.model, text).await?;
        if vector.len() != self.dims {
            return Err(ServiceError::Malformed(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dims
            )));
        }
        Ok(vector)
    }
}

// ============ Fallback chain ============

/// Tries each tier in order and falls back to [`HashEmbedding`].
pub struct FallbackEmbedder {
    tiers: Vec<Arc<dyn EmbeddingStrategy>>,
    last_resort: HashEmbedding,
}

impl FallbackEmbedder {
    pub fn new(tiers: Vec<Arc<dyn EmbeddingStrategy>>, dims: usize) -> Self {
        Self {
            tiers,
            last_resort: HashEmbedding::new(dims),
        }
    }

    /// A chain consisting only of the deterministic hash tier.
    pub fn hash_only(dims: usize) -> Self {
        Self::new(Vec::new(), dims)
    }

    pub fn dims(&self) -> usize {
        self.last_resort.dims()
    }

    /// Embed `text` with the first tier that succeeds.
    ///
    /// A tier that returns a vector of the wrong length counts as failed.
    pub async fn embed(&self, text: &str) -> Embedding {
        for tier in &self.tiers {
            let source = tier.source();
            match tier.embed(text).await {
                Ok(vector) if vector.len() == self.dims() => {
                    return Embedding { vector, source };
                }
                Ok(vector) => {
                    tracing::warn!(
                        tier = source.as_str(),
                        got = vector.len(),
                        expected = self.dims(),
                        "embedding tier returned wrong dimensionality; falling back"
                    );
                }
                Err(e) => {
                    tracing::warn!(tier = source.as_str(), error = %e, "embedding tier failed; falling back");
                }
            }
        }

        Embedding {
            vector: self.last_resort.embed(text),
            source: EmbeddingSource::Hash,
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
