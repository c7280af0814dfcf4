//! Errors that can occur while loading and validating mapping documents.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MappingError>;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mapping document failed schema validation:\n  - {0}")]
    Validation(String),

    #[error("unknown transform {transform:?} on field {canonical_field}")]
    UnknownTransform { canonical_field: String, transform: String },

    #[error("transform {transform} failed for field {canonical_field}: {detail}")]
    TransformFailed {
        canonical_field: String,
        transform: String,
        detail: String,
    },

    #[error("required field {canonical_field} missing at source path {source_path}")]
    RequiredFieldMissing { canonical_field: String, source_path: String },

    #[error("no mapping registered for canonical table {0}")]
    UnknownCanonicalTable(String),
}

impl MappingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
