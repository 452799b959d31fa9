//! Core data models used throughout docqa.
//!
//! These types represent the documents, chunks, index entries, and answers
//! that flow through the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A successfully ingested document, as remembered by the document cache.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub fingerprint: String,
    pub url: String,
    pub chunk_count: usize,
    pub processed_at: DateTime<Utc>,
}

/// A chunk of a document's cleaned text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
}

impl Chunk {
    /// Derives the index identifier for chunk `index` of a document.
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{}_chunk_{}", document_id, index)
    }
}

/// Metadata stored alongside each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    pub doc_id: String,
    pub chunk_index: usize,
    pub document_url: String,
}

/// A vector ready to be upserted into the index.
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A single nearest-neighbour hit returned by the index.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<ChunkMetadata>,
}

/// The answer to one question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    /// Raw similarity of the best match; not clamped.
    pub confidence: f32,
    pub source_chunks: Vec<String>,
}
