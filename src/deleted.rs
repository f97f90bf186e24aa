//! In-memory record of soft-deleted versions pending permanent purge

use std::collections::HashMap;

use parking_lot::Mutex;

/// Cache of (subject, version) pairs soft-deleted in this process, mapped to
/// the schema id their marker references.
///
/// This only accelerates a later permanent delete: after a restart the cache
/// is empty and the purge falls back to reading the on-disk soft-deleted
/// marker instead. Nothing here is durable or required for correctness.
#[derive(Default)]
pub struct DeletedVersions {
    entries: Mutex<HashMap<(String, u64), u64>>,
}

impl DeletedVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, subject: &str, version: u64, id: u64) {
        self.entries
            .lock()
            .insert((subject.to_string(), version), id);
    }

    /// Remove and return the cached id for a soft-deleted version
    pub fn take(&self, subject: &str, version: u64) -> Option<u64> {
        self.entries
            .lock()
            .remove(&(subject.to_string(), version))
    }
}
