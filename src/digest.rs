//! Content fingerprints used as dedup keys

use sha2::{Digest as _, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fingerprint of a schema body, used to find identical content already in
/// the store. This is a dedup key, not a security primitive: two texts that
/// hash the same are treated as the same schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDigest(String);

impl SchemaDigest {
    /// Compute the digest of a schema body
    pub fn from_text(text: &str) -> Self {
        let hash = Sha256::digest(text.as_bytes());
        Self(format!("{:x}", hash))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
