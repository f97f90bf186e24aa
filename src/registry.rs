//! Registry engine
//!
//! Orchestrates the id store, the subject version index and the
//! deleted-version cache into the registry's operation contract: save with
//! dedup and idempotent re-registration, lookups by id, content and
//! subject/version, and the soft/permanent delete lifecycle.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::deleted::DeletedVersions;
use crate::digest::SchemaDigest;
use crate::error::{RegistryError, Result};
use crate::ids::IdStore;
use crate::record::VersionedSchema;
use crate::subjects::SubjectIndex;

const IDS_SUBDIR: &str = "ids";
const SUBJECTS_SUBDIR: &str = "subjects";

/// The schema registry engine.
///
/// Owns the on-disk tree exclusively; one instance per root directory per
/// process. Lookups run lock-free against the in-memory indices and the
/// subject directory tree. All mutating operations serialize on a single
/// coarse writer lock -- id and version allocation depend on global
/// serialization, and the workload does not justify anything finer.
pub struct SchemaRegistry {
    root: PathBuf,
    ids: IdStore,
    subjects: SubjectIndex,
    deleted: DeletedVersions,
    write_lock: Mutex<()>,
}

impl SchemaRegistry {
    /// Open a registry rooted at `path`, creating the directory layout on
    /// first run and recovering all indices from disk before returning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let ids = IdStore::open(root.join(IDS_SUBDIR))?;
        let subjects = SubjectIndex::open(root.join(SUBJECTS_SUBDIR))?;
        ids.recover()?;
        info!(root = %root.display(), records = ids.len(), "registry opened");
        Ok(Self {
            root,
            ids,
            subjects,
            deleted: DeletedVersions::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of the registry
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted names of all known subjects, empty if none
    pub fn lookup_subjects(&self) -> Result<Vec<String>> {
        self.subjects.list_subjects()
    }

    /// Find a schema by exact content, without subject context
    pub fn lookup_schema_by_content(&self, schema: &str) -> Option<VersionedSchema> {
        let digest = SchemaDigest::from_text(schema);
        self.ids
            .find_by_digest(&digest)
            .map(VersionedSchema::unversioned)
    }

    /// Find a schema by its global id
    pub fn lookup_schema_by_id(&self, id: u64) -> Option<VersionedSchema> {
        self.ids.find_by_id(id).map(VersionedSchema::unversioned)
    }

    /// Find a schema by content within a subject.
    ///
    /// If the content is registered under the subject the result carries the
    /// version; if it exists globally but not under this subject the result
    /// is version-less; if it is unknown entirely, `None`.
    pub fn lookup_schema(&self, subject: &str, schema: &str) -> Result<Option<VersionedSchema>> {
        validate_subject(subject)?;
        let digest = SchemaDigest::from_text(schema);
        let Some(record) = self.ids.find_by_digest(&digest) else {
            return Ok(None);
        };
        match self.subjects.version_of(subject, record.id)? {
            Some(version) => Ok(Some(VersionedSchema::at_version(record, version))),
            None => Ok(Some(VersionedSchema::unversioned(record))),
        }
    }

    /// Register a schema under a subject.
    ///
    /// Re-registering content already versioned under the subject returns the
    /// existing (id, version) unchanged. Novel content gets the next global
    /// id; content known globally but new to this subject reuses its id.
    /// Either way the subject gets version `max live + 1`.
    pub fn save_schema(&self, subject: &str, schema: &str) -> Result<VersionedSchema> {
        validate_subject(subject)?;
        let _guard = self.write_lock.lock();

        let digest = SchemaDigest::from_text(schema);
        let record = match self.ids.find_by_digest(&digest) {
            Some(record) => {
                if let Some(version) = self.subjects.version_of(subject, record.id)? {
                    debug!(subject, version, id = record.id, "schema already registered");
                    return Ok(VersionedSchema::at_version(record, version));
                }
                record
            }
            None => self.ids.create(schema, digest)?,
        };

        let next = self.subjects.max_live_version(subject)? + 1;
        self.subjects.create_live_ref(subject, next, record.id)?;
        debug!(subject, version = next, id = record.id, "registered schema");
        Ok(VersionedSchema::at_version(record, next))
    }

    /// Resolve a subject version to its schema.
    ///
    /// A dangling marker -- one whose id was removed out-of-band via
    /// [`SchemaRegistry::delete_schema_id`] -- is dropped on the spot and the
    /// call reports absent. Repairing lazily on access is deliberate: there
    /// is no reverse index from id to referencing versions, so stale markers
    /// are found here, not at delete time.
    pub fn lookup_subject_version(
        &self,
        subject: &str,
        version: u64,
    ) -> Result<Option<VersionedSchema>> {
        validate_subject(subject)?;
        let Some(id) = self.subjects.resolve_live(subject, version)? else {
            return Ok(None);
        };
        match self.ids.find_by_id(id) {
            Some(record) => Ok(Some(VersionedSchema::at_version(record, version))),
            None => {
                warn!(subject, version, id, "dropping dangling version marker");
                self.subjects.remove_live_marker(subject, version)?;
                Ok(None)
            }
        }
    }

    /// Sorted live versions of a subject, or `None` for an unknown subject
    pub fn lookup_subject_versions(&self, subject: &str) -> Result<Option<Vec<u64>>> {
        validate_subject(subject)?;
        self.subjects.list_live_versions(subject)
    }

    /// Remove a schema record by id, from the id store only.
    ///
    /// Any version markers still pointing at the id become dangling and are
    /// repaired lazily when next accessed. Returns whether the id existed.
    pub fn delete_schema_id(&self, id: u64) -> Result<bool> {
        let _guard = self.write_lock.lock();
        self.ids.remove(id)
    }

    /// Remove every live version of a subject and the subject itself.
    ///
    /// Soft-deleted markers survive (and keep the subject name alive until
    /// they are purged); shared schema records are never touched. Returns
    /// the removed versions, or `None` for an unknown subject.
    pub fn delete_subject(&self, subject: &str) -> Result<Option<Vec<u64>>> {
        validate_subject(subject)?;
        let _guard = self.write_lock.lock();
        self.subjects.remove_all_live(subject)
    }

    /// Delete a subject version, softly or permanently.
    ///
    /// A live version is soft-deleted: its marker is retained but hidden,
    /// and remembered for a later purge. With `permanent` the same call
    /// continues into the purge, so one request against a live version both
    /// soft-deletes and destroys it.
    ///
    /// A version that is not live only resolves when `permanent` is set and
    /// a soft-deleted reference can be found -- in the in-process cache, or
    /// on disk after a restart. The purge removes the underlying record,
    /// the marker, and the subject container if that emptied it.
    ///
    /// Soft-deleting an already soft-deleted version reports absent.
    pub fn delete_subject_version(
        &self,
        subject: &str,
        version: u64,
        permanent: bool,
    ) -> Result<Option<VersionedSchema>> {
        validate_subject(subject)?;
        let _guard = self.write_lock.lock();

        let live_id = self.subjects.soft_delete(subject, version)?;
        if let Some(id) = live_id {
            if !permanent {
                match self.ids.find_by_id(id) {
                    Some(record) => {
                        self.deleted.remember(subject, version, id);
                        debug!(subject, version, id, "soft-deleted subject version");
                        return Ok(Some(VersionedSchema::at_version(record, version)));
                    }
                    None => {
                        // the live marker was already dangling; nothing left
                        // to soft-delete, so clean up and report absent
                        warn!(subject, version, id, "purging dangling version marker");
                        self.subjects.purge(subject, version)?;
                        return Ok(None);
                    }
                }
            }
        } else if !permanent {
            return Ok(None);
        }

        let id = match live_id {
            Some(id) => id,
            None => {
                let cached = self.deleted.take(subject, version);
                match cached {
                    Some(id) => id,
                    None => match self.subjects.resolve_soft_deleted(subject, version)? {
                        Some(id) => id,
                        None => return Ok(None),
                    },
                }
            }
        };

        // capture the record before destroying it so the response can carry it
        let record = self.ids.find_by_id(id);
        self.ids.remove(id)?;
        self.deleted.take(subject, version);
        self.subjects.purge(subject, version)?;
        debug!(subject, version, id, "permanently deleted subject version");
        Ok(record.map(|record| VersionedSchema::at_version(record, version)))
    }
}

/// Subject names become directory names, so they must be non-empty, visible
/// and free of path separators.
fn validate_subject(subject: &str) -> Result<()> {
    let bad = subject.is_empty()
        || subject.starts_with('.')
        || subject.contains(['/', '\\', '\0']);
    if bad {
        return Err(RegistryError::InvalidSubject(subject.to_string()));
    }
    Ok(())
}
