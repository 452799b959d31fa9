//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow capability the pipelines need:
//! idempotent upsert by id and top-k nearest-neighbour query with metadata.
//! Two backends are provided:
//!
//! - **[`PineconeIndex`]**: the remote similarity-search service, created
//!   lazily on first use.
//! - **[`MemoryIndex`]**: brute-force cosine similarity in process memory,
//!   for local runs and tests.
//!
//! Implementations must be `Send + Sync` to be shared across request
//! handlers. Concurrent upserts to the same id are last-write-wins.

pub mod memory;
pub mod pinecone;

use async_trait::async_trait;

use crate::models::{IndexedEntry, ScoredMatch};
use crate::service::ServiceError;

pub use memory::MemoryIndex;
pub use pinecone::PineconeIndex;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Index name, reported by the status endpoint.
    fn name(&self) -> &str;

    /// Insert or overwrite entries by id.
    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), ServiceError>;

    /// Up to `top_k` matches ordered by descending score.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, ServiceError>;
}
