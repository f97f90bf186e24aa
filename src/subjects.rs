//! Per-subject version references
//!
//! One directory per subject under `subjects/`, one symlink per version
//! inside it. A live marker is a symlink named with the decimal version
//! number whose target is the decimal schema id. Soft-deleting a version
//! renames the symlink to `<version>.deleted`, which hides it from every
//! live scan while preserving the id it points at, so the reference survives
//! a restart and can still be purged permanently later.
//!
//! This index keeps no in-memory state; the directory tree is both the store
//! and the index. It only reports marker presence -- whether a marker's
//! target id still exists is the engine's business.

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

const DELETED_SUFFIX: &str = ".deleted";

/// Filesystem-backed map from (subject, version) to schema id
pub struct SubjectIndex {
    dir: PathBuf,
}

impl SubjectIndex {
    /// Create the index over `dir`, creating the directory if needed
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn subject_dir(&self, subject: &str) -> PathBuf {
        self.dir.join(subject)
    }

    fn live_path(&self, subject: &str, version: u64) -> PathBuf {
        self.subject_dir(subject).join(version.to_string())
    }

    fn deleted_path(&self, subject: &str, version: u64) -> PathBuf {
        self.subject_dir(subject)
            .join(format!("{version}{DELETED_SUFFIX}"))
    }

    /// Sorted names of all subjects with at least one marker of any kind
    pub fn list_subjects(&self) -> Result<Vec<String>> {
        let mut subjects = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            subjects.push(name.into_owned());
        }
        subjects.sort();
        Ok(subjects)
    }

    /// Highest version with a live marker, 0 if the subject has none
    pub fn max_live_version(&self, subject: &str) -> Result<u64> {
        Ok(self
            .live_refs(subject)?
            .last()
            .map(|&(version, _)| version)
            .unwrap_or(0))
    }

    /// Write a new live marker pointing at `id`.
    ///
    /// The caller guarantees `version` is the strictly-next number for the
    /// subject; a stale entry squatting on the name is replaced.
    pub fn create_live_ref(&self, subject: &str, version: u64, id: u64) -> Result<()> {
        let subject_dir = self.subject_dir(subject);
        fs::create_dir_all(&subject_dir)?;
        let link = self.live_path(subject, version);
        if link.symlink_metadata().is_ok() {
            fs::remove_file(&link)?;
        }
        symlink(id.to_string(), &link)?;
        debug!(subject, version, id, "created live version marker");
        Ok(())
    }

    /// Read the id a live marker points at, or `None` if no live marker
    /// exists. Does not check that the id still resolves.
    pub fn resolve_live(&self, subject: &str, version: u64) -> Result<Option<u64>> {
        read_marker(&self.live_path(subject, version))
    }

    /// Read the id a soft-deleted marker points at, without removing it
    pub fn resolve_soft_deleted(&self, subject: &str, version: u64) -> Result<Option<u64>> {
        read_marker(&self.deleted_path(subject, version))
    }

    /// Sorted live version numbers, or `None` if the subject is unknown
    /// (no markers of any kind)
    pub fn list_live_versions(&self, subject: &str) -> Result<Option<Vec<u64>>> {
        match self.scan_live(subject)? {
            Some(refs) => Ok(Some(refs.into_iter().map(|(version, _)| version).collect())),
            None => Ok(None),
        }
    }

    /// Sorted (version, id) pairs for every live marker of a subject.
    /// An unknown subject yields an empty list.
    pub fn live_refs(&self, subject: &str) -> Result<Vec<(u64, u64)>> {
        Ok(self.scan_live(subject)?.unwrap_or_default())
    }

    /// Lowest live version currently pointing at `id`, if any
    pub fn version_of(&self, subject: &str, id: u64) -> Result<Option<u64>> {
        Ok(self
            .live_refs(subject)?
            .into_iter()
            .find(|&(_, target)| target == id)
            .map(|(version, _)| version))
    }

    /// Convert a live marker into a soft-deleted one, preserving its target.
    ///
    /// Returns the id the marker referenced, or `None` if no live marker
    /// existed -- including when the version is already soft-deleted, so a
    /// repeat soft-delete reports absent rather than succeeding twice.
    pub fn soft_delete(&self, subject: &str, version: u64) -> Result<Option<u64>> {
        let live = self.live_path(subject, version);
        let Some(id) = read_marker(&live)? else {
            return Ok(None);
        };
        fs::rename(&live, self.deleted_path(subject, version))?;
        debug!(subject, version, id, "soft-deleted version marker");
        Ok(Some(id))
    }

    /// Drop a stale live marker without touching the subject container.
    /// Used by the engine's lazy repair of dangling references.
    pub fn remove_live_marker(&self, subject: &str, version: u64) -> Result<()> {
        remove_if_present(&self.live_path(subject, version))?;
        Ok(())
    }

    /// Remove whatever marker (live or soft-deleted) exists at `version`,
    /// and the subject directory itself if that left it empty.
    pub fn purge(&self, subject: &str, version: u64) -> Result<()> {
        remove_if_present(&self.live_path(subject, version))?;
        remove_if_present(&self.deleted_path(subject, version))?;
        self.remove_subject_if_empty(subject)?;
        Ok(())
    }

    /// Delete every live marker of a subject and, if nothing else remains,
    /// the subject itself.
    ///
    /// Soft-deleted markers are left in place and keep the subject alive;
    /// only a later permanent purge removes them.
    ///
    /// Returns the sorted removed versions, or `None` for an unknown subject.
    pub fn remove_all_live(&self, subject: &str) -> Result<Option<Vec<u64>>> {
        let Some(refs) = self.scan_live(subject)? else {
            return Ok(None);
        };
        let mut removed = Vec::with_capacity(refs.len());
        for (version, _) in refs {
            remove_if_present(&self.live_path(subject, version))?;
            removed.push(version);
        }
        self.remove_subject_if_empty(subject)?;
        debug!(subject, versions = ?removed, "removed all live version markers");
        Ok(Some(removed))
    }

    fn remove_subject_if_empty(&self, subject: &str) -> Result<()> {
        let subject_dir = self.subject_dir(subject);
        match fs::read_dir(&subject_dir) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    fs::remove_dir(&subject_dir)?;
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Scan a subject directory for live markers; `None` if the directory
    /// does not exist at all.
    fn scan_live(&self, subject: &str) -> Result<Option<Vec<(u64, u64)>>> {
        let subject_dir = self.subject_dir(subject);
        let entries = match fs::read_dir(&subject_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut refs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // soft-deleted markers, hidden files and anything else that is
            // not a plain decimal number is not a live marker
            let Ok(version) = name.parse::<u64>() else {
                continue;
            };
            if let Some(id) = read_marker(&entry.path())? {
                refs.push((version, id));
            }
        }
        refs.sort_unstable();
        Ok(Some(refs))
    }
}

/// Read a marker symlink's target as a schema id.
///
/// `None` if nothing is at the path, if the entry is not a symlink, or if
/// the target is not a decimal id (a corrupt marker is ignored, not fatal).
fn read_marker(path: &Path) -> Result<Option<u64>> {
    match path.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let target = fs::read_link(path)?;
    Ok(target
        .file_name()
        .and_then(OsStr::to_str)
        .and_then(|s| s.parse::<u64>().ok()))
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_index(dir: &Path) -> SubjectIndex {
        SubjectIndex::open(dir.to_path_buf()).unwrap()
    }

    #[test]
    fn test_create_and_resolve() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        index.create_live_ref("foo", 1, 10).unwrap();
        index.create_live_ref("foo", 2, 11).unwrap();

        assert_eq!(index.resolve_live("foo", 1).unwrap(), Some(10));
        assert_eq!(index.resolve_live("foo", 2).unwrap(), Some(11));
        assert_eq!(index.resolve_live("foo", 3).unwrap(), None);
        assert_eq!(index.resolve_live("bar", 1).unwrap(), None);

        assert_eq!(index.max_live_version("foo").unwrap(), 2);
        assert_eq!(index.max_live_version("bar").unwrap(), 0);
        assert_eq!(index.list_live_versions("foo").unwrap(), Some(vec![1, 2]));
        assert_eq!(index.list_live_versions("bar").unwrap(), None);
        assert_eq!(index.version_of("foo", 11).unwrap(), Some(2));
        assert_eq!(index.version_of("foo", 12).unwrap(), None);
    }

    #[test]
    fn test_list_subjects_sorted() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        assert!(index.list_subjects().unwrap().is_empty());

        index.create_live_ref("zebra", 1, 1).unwrap();
        index.create_live_ref("apple", 1, 2).unwrap();
        assert_eq!(index.list_subjects().unwrap(), vec!["apple", "zebra"]);
    }

    #[test]
    fn test_soft_delete_lifecycle() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        index.create_live_ref("foo", 1, 10).unwrap();

        assert_eq!(index.soft_delete("foo", 1).unwrap(), Some(10));
        // hidden from live scans, target preserved
        assert_eq!(index.resolve_live("foo", 1).unwrap(), None);
        assert_eq!(index.list_live_versions("foo").unwrap(), Some(vec![]));
        assert_eq!(index.resolve_soft_deleted("foo", 1).unwrap(), Some(10));

        // repeat soft-delete reports absent
        assert_eq!(index.soft_delete("foo", 1).unwrap(), None);

        // purge removes the marker and the now-empty subject
        index.purge("foo", 1).unwrap();
        assert_eq!(index.resolve_soft_deleted("foo", 1).unwrap(), None);
        assert_eq!(index.list_live_versions("foo").unwrap(), None);
        assert!(index.list_subjects().unwrap().is_empty());
    }

    #[test]
    fn test_soft_deleted_marker_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let index = open_index(dir.path());
            index.create_live_ref("foo", 1, 10).unwrap();
            index.soft_delete("foo", 1).unwrap();
        }
        let index = open_index(dir.path());
        assert_eq!(index.resolve_soft_deleted("foo", 1).unwrap(), Some(10));
    }

    #[test]
    fn test_remove_all_live_spares_soft_deleted() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        index.create_live_ref("foo", 1, 10).unwrap();
        index.create_live_ref("foo", 2, 11).unwrap();
        index.create_live_ref("foo", 3, 12).unwrap();
        index.soft_delete("foo", 1).unwrap();

        assert_eq!(index.remove_all_live("foo").unwrap(), Some(vec![2, 3]));
        // the soft-deleted marker keeps the subject alive
        assert_eq!(index.list_subjects().unwrap(), vec!["foo"]);
        assert_eq!(index.resolve_soft_deleted("foo", 1).unwrap(), Some(10));

        assert_eq!(index.remove_all_live("missing").unwrap(), None);
    }

    #[test]
    fn test_remove_all_live_drops_empty_subject() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        index.create_live_ref("foo", 1, 10).unwrap();
        assert_eq!(index.remove_all_live("foo").unwrap(), Some(vec![1]));
        assert_eq!(index.list_live_versions("foo").unwrap(), None);
        assert!(index.list_subjects().unwrap().is_empty());
    }

    #[test]
    fn test_scan_ignores_stray_entries() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        index.create_live_ref("foo", 1, 10).unwrap();
        fs::write(dir.path().join("foo").join("notes.txt"), "hi").unwrap();
        fs::write(dir.path().join("foo").join(".hidden"), "hi").unwrap();
        // a plain file with a numeric name is not a marker
        fs::write(dir.path().join("foo").join("2"), "10").unwrap();

        assert_eq!(index.list_live_versions("foo").unwrap(), Some(vec![1]));
        assert_eq!(index.resolve_live("foo", 2).unwrap(), None);
    }

    #[test]
    fn test_max_live_ignores_soft_deleted() {
        let dir = tempdir().unwrap();
        let index = open_index(dir.path());

        index.create_live_ref("foo", 1, 10).unwrap();
        index.create_live_ref("foo", 2, 11).unwrap();
        index.soft_delete("foo", 2).unwrap();

        assert_eq!(index.max_live_version("foo").unwrap(), 1);
    }
}
