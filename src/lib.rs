//! Schemavault
//!
//! A content-addressed schema registry: opaque schema texts are deduplicated
//! by digest, assigned global ids, and tracked per subject as an ordered
//! version history of references into the id store.
//!
//! ## Features
//!
//! - **Content addressing**: identical schema bodies share one record and id
//! - **Indirect version references**: a subject version is a pointer to an
//!   id, never a copy of the body
//! - **Soft and permanent deletes**: distinct lifecycle transitions, with
//!   soft-deleted references recoverable into a permanent purge
//! - **Crash recovery**: in-memory indices are a cache rebuilt wholesale from
//!   disk at startup; the filesystem is the ground truth
//! - **Lazy consistency repair**: a version marker whose id has been deleted
//!   is dropped when next accessed, not cascaded eagerly
//!
//! ## On-disk layout
//!
//! ```text
//! <root>/
//! ├── ids/
//! │   ├── 1                 {"schema":"...","digest":"<hex>","id":1}
//! │   └── 2
//! └── subjects/
//!     └── foo/
//!         ├── 1             symlink -> "1"   (live version)
//!         └── 2.deleted     symlink -> "2"   (soft-deleted version)
//! ```

pub mod deleted;
pub mod digest;
pub mod error;
pub mod ids;
pub mod record;
pub mod registry;
pub mod server;
pub mod subjects;

pub use digest::SchemaDigest;
pub use error::{RegistryError, Result};
pub use record::{SchemaRecord, VersionedSchema};
pub use registry::SchemaRegistry;
