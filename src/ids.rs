//! Durable id-keyed storage of schema records
//!
//! One JSON file per schema id under the `ids/` directory, plus in-memory
//! digest and id indices rebuilt wholesale from disk at startup. The
//! filesystem is the ground truth; the maps are a cache of it.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::digest::SchemaDigest;
use crate::error::Result;
use crate::record::SchemaRecord;

/// Content-addressed record store keyed by id.
///
/// Lookups are lock-free reads on the in-memory indices. `create` and
/// `remove` mutate disk and indices together and must run under the
/// registry's writer lock so id allocation cannot race.
pub struct IdStore {
    dir: PathBuf,
    by_digest: DashMap<SchemaDigest, Arc<SchemaRecord>>,
    by_id: DashMap<u64, Arc<SchemaRecord>>,
    /// Highest id ever seen, on disk or allocated; ids are never reused
    max_id: AtomicU64,
}

impl IdStore {
    /// Create the store over `dir`, creating the directory if needed.
    /// Call [`IdStore::recover`] before serving lookups.
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            by_digest: DashMap::new(),
            by_id: DashMap::new(),
            max_id: AtomicU64::new(0),
        })
    }

    /// Rebuild both indices from the persisted record files.
    ///
    /// Entries that are not record files (directories, hidden files,
    /// non-numeric names) are ignored. A record that cannot be parsed, or
    /// whose self-reported id disagrees with its filename, is logged and
    /// skipped rather than failing startup.
    pub fn recover(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if entry.path().is_dir() || name.starts_with('.') {
                continue;
            }
            let Ok(id) = name.parse::<u64>() else {
                continue;
            };
            // even a record we end up skipping pins the watermark, so its id
            // cannot be handed out again
            self.max_id.fetch_max(id, Ordering::SeqCst);
            let content = match fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(e) => {
                    warn!(id, error = %e, "skipping unreadable id file");
                    continue;
                }
            };
            let record: SchemaRecord = match serde_json::from_str(&content) {
                Ok(record) => record,
                Err(e) => {
                    warn!(id, error = %e, "skipping malformed id file");
                    continue;
                }
            };
            if record.id != id {
                warn!(
                    file = id,
                    contains = record.id,
                    "id file contains wrong id, skipping"
                );
                continue;
            }
            let record = Arc::new(record);
            self.by_digest.insert(record.digest.clone(), record.clone());
            self.by_id.insert(id, record);
        }
        debug!(records = self.by_id.len(), "id store recovered");
        Ok(())
    }

    /// Look up a record by content fingerprint. In-memory only.
    pub fn find_by_digest(&self, digest: &SchemaDigest) -> Option<Arc<SchemaRecord>> {
        self.by_digest.get(digest).map(|r| r.clone())
    }

    /// Look up a record by id. In-memory only.
    pub fn find_by_id(&self, id: u64) -> Option<Arc<SchemaRecord>> {
        self.by_id.get(&id).map(|r| r.clone())
    }

    /// Persist a new record for novel content, allocating the next id.
    ///
    /// Must be called under the registry writer lock.
    pub fn create(&self, schema: &str, digest: SchemaDigest) -> Result<Arc<SchemaRecord>> {
        let id = self.max_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = Arc::new(SchemaRecord {
            schema: schema.to_string(),
            digest: digest.clone(),
            id,
        });
        let json = serde_json::to_string(record.as_ref())?;
        fs::write(self.dir.join(id.to_string()), json)?;
        self.by_digest.insert(digest, record.clone());
        self.by_id.insert(id, record.clone());
        debug!(id, digest = %record.digest, "stored new schema record");
        Ok(record)
    }

    /// Delete a record from disk and both indices.
    ///
    /// Version markers elsewhere that still point at this id are left
    /// dangling on purpose; there is no reverse index from id to referencing
    /// versions, and stale markers are repaired lazily on access.
    ///
    /// Returns whether a record was actually removed.
    pub fn remove(&self, id: u64) -> Result<bool> {
        let Some((_, record)) = self.by_id.remove(&id) else {
            return Ok(false);
        };
        self.by_digest.remove(&record.digest);
        match fs::remove_file(self.dir.join(id.to_string())) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(id, "removed schema record");
        Ok(true)
    }

    /// Number of records currently indexed
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
