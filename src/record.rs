//! Schema record types

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::digest::SchemaDigest;

/// The content-addressed unit of storage: one distinct schema body with its
/// globally unique id and digest.
///
/// This struct is the exact persisted document under `ids/<id>`. A subject
/// version is never persisted with it; version context is attached on the way
/// out via [`VersionedSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// The opaque schema body, immutable once stored
    pub schema: String,
    /// Fingerprint of `schema`
    pub digest: SchemaDigest,
    /// Globally unique id, monotonically assigned, never reused
    pub id: u64,
}

/// A schema record annotated with optional subject-version context.
///
/// `version() == None` means the schema exists globally but was not resolved
/// through (or registered under) the subject in question.
#[derive(Debug, Clone)]
pub struct VersionedSchema {
    record: Arc<SchemaRecord>,
    version: Option<u64>,
}

impl VersionedSchema {
    pub(crate) fn unversioned(record: Arc<SchemaRecord>) -> Self {
        Self { record, version: None }
    }

    pub(crate) fn at_version(record: Arc<SchemaRecord>, version: u64) -> Self {
        Self { record, version: Some(version) }
    }

    pub fn id(&self) -> u64 {
        self.record.id
    }

    pub fn schema(&self) -> &str {
        &self.record.schema
    }

    pub fn digest(&self) -> &SchemaDigest {
        &self.record.digest
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }
}
