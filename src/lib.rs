//! # docqa
//!
//! Question answering over PDF documents with retrieval-augmented
//! generation.
//!
//! A client posts a document URL and a list of questions. The document is
//! downloaded once per process, its text extracted, cleaned, split into
//! overlapping chunks, embedded, and upserted into a vector index. Each
//! question is then embedded, matched against the index, and answered by a
//! language model constrained to the retrieved context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │  Fetch   │──▶│ Extract → Chunk → Embed  │──▶│ Vector index │
//! │ HTTP GET │   │     (DocumentPipeline)   │   │ Pinecone/mem │
//! └──────────┘   └──────────────────────────┘   └──────┬───────┘
//!                                                      │ top-k
//!                ┌──────────────────────────┐          │
//!   question ───▶│ Embed → Query → Generate │◀─────────┘
//!                │      (QueryPipeline)     │
//!                └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Document identity from URL |
//! | [`fetch`] | Document download |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Text cleaning and chunking |
//! | [`service`] | Shared HTTP retry policy and error taxonomy |
//! | [`llm`] | Chat-completion client |
//! | [`embedding`] | Embedding fallback chain |
//! | [`index`] | Vector index backends |
//! | [`answer`] | Grounded answer generation |
//! | [`cache`] | Processed-document cache |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`query`] | Per-question retrieval and answering |
//! | [`rag`] | Orchestrator |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod query;
pub mod rag;
pub mod server;
pub mod service;
