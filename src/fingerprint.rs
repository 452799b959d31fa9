//! Document identity.
//!
//! A document is identified by a fingerprint of its source URL, independent
//! of the bytes served at that URL. Chunk identifiers in the vector index are
//! derived from the fingerprint, so the algorithm is pinned by
//! [`FINGERPRINT_SCHEME`]: any change to it must introduce a new scheme name.

/// Scheme `v1`: lowercase hex MD5 of the UTF-8 URL string.
pub const FINGERPRINT_SCHEME: &str = "v1-md5-hex";

/// Computes the fingerprint of a document URL.
///
/// ```rust
/// use docqa::fingerprint::document_fingerprint;
///
/// let id = document_fingerprint("https://example.com/policy.pdf");
/// assert_eq!(id.len(), 32);
/// assert_eq!(id, document_fingerprint("https://example.com/policy.pdf"));
/// ```
pub fn document_fingerprint(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}
