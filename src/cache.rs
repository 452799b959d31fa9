//! Process-lifetime record of ingested documents.
//!
//! Lookup and insert are separate critical sections; two concurrent first
//! requests for the same document may both ingest it. Upserts are keyed by
//! chunk id, so the second ingestion overwrites the first.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::DocumentRecord;

#[derive(Default)]
pub struct DocumentCache {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &str) -> Option<DocumentRecord> {
        self.records.read().ok()?.get(fingerprint).cloned()
    }

    pub fn insert(&self, record: DocumentRecord) {
        // A poisoned lock only means another writer panicked mid-insert;
        // the map itself is still usable.
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.insert(record.fingerprint.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
