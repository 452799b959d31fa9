//! In-memory [`VectorIndex`] for local runs and tests.
//!
//! Entries live in a `HashMap` behind `std::sync::RwLock`. Queries score
//! every stored vector with cosine similarity.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::VectorIndex;
use crate::embedding::cosine_similarity;
use crate::models::{ChunkMetadata, IndexedEntry, ScoredMatch};
use crate::service::ServiceError;

struct StoredVector {
    values: Vec<f32>,
    metadata: ChunkMetadata,
}

pub struct MemoryIndex {
    name: String,
    vectors: RwLock<HashMap<String, StoredVector>>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vectors: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.vectors.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored metadata for `id`, if present.
    pub fn metadata(&self, id: &str) -> Option<ChunkMetadata> {
        let vectors = self.vectors.read().ok()?;
        vectors.get(id).map(|v| v.metadata.clone())
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn poisoned() -> ServiceError {
    ServiceError::Malformed("memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), ServiceError> {
        let mut vectors = self.vectors.write().map_err(|_| poisoned())?;
        for entry in entries {
            vectors.insert(
                entry.id.clone(),
                StoredVector {
                    values: entry.values.clone(),
                    metadata: entry.metadata.clone(),
                },
            );
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, ServiceError> {
        let vectors = self.vectors.read().map_err(|_| poisoned())?;
        let mut matches: Vec<ScoredMatch> = vectors
            .iter()
            .map(|(id, stored)| ScoredMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &stored.values),
                metadata: Some(stored.metadata.clone()),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, values: Vec<f32>, text: &str) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            values,
            metadata: ChunkMetadata {
                text: text.to_string(),
                doc_id: "doc".to_string(),
                chunk_index: 0,
                document_url: "https://example.com/doc.pdf".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let index = MemoryIndex::default();
        index
            .upsert(&[
                entry("a", vec![1.0, 0.0], "east"),
                entry("b", vec![0.0, 1.0], "north"),
                entry("c", vec![0.7, 0.7], "north-east"),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[1].id, "c");
        assert!(matches[0].score >= matches[1].score);
        assert_eq!(matches[0].metadata.as_ref().unwrap().text, "east");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let index = MemoryIndex::default();
        index.upsert(&[entry("a", vec![1.0], "old")]).await.unwrap();
        index.upsert(&[entry("a", vec![1.0], "new")]).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.metadata("a").unwrap().text, "new");
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_matches() {
        let index = MemoryIndex::default();
        assert!(index.is_empty());
        assert!(index.query(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }
}
