//! Deterministic hash embedding, the last tier of the chain.

use sha2::{Digest, Sha256};

/// Infallible embedding derived from the SHA-256 digest of the text.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedding {
    dims: usize,
}

impl HashEmbedding {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        hash_embedding(text, self.dims)
    }
}

/// Spread the SHA-256 digest of `text` over a `dims`-length vector.
///
/// Each 4-byte group of the digest is read as a big-endian `u32`, normalized
/// to `[0, 1]` and rescaled to `[-1, 1]`. Remaining slots are zero. The
/// result depends only on `text` and `dims`.
pub fn hash_embedding(text: &str, dims: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());

    let mut vector: Vec<f32> = digest
        .chunks_exact(4)
        .map(|group| {
            let n = u32::from_be_bytes([group[0], group[1], group[2], group[3]]);
            let unit = n as f64 / u32::MAX as f64;
            (unit * 2.0 - 1.0) as f32
        })
        .collect();

    vector.resize(dims, 0.0);
    vector
}
