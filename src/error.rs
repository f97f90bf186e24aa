//! Error types for the schema registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors.
///
/// Absent resources (unknown subject, version, or id) are not errors; those
/// come back as `Ok(None)` from the engine. Errors are reserved for bad input
/// reaching the engine and for storage failures.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid subject name: {0:?}")]
    InvalidSubject(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// HTTP status class the boundary layer should map this error to
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::InvalidSubject(_) => 400,
            RegistryError::Io(_) | RegistryError::Json(_) => 500,
        }
    }
}
