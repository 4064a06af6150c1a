//! Error types for dzdb-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dzdb-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON file could not be parsed
    #[error("invalid JSON in '{path}': {source}")]
    FragmentParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The database root is missing
    #[error("database folder not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// A record reached finalization without an identifier
    #[error(
        "missing required source ID at row {row}: objectName={object_name} path={path}. \
         Run `dzdb sync-ids` to backfill IDs."
    )]
    MissingId {
        row: usize,
        object_name: String,
        path: String,
    },

    /// A record reached finalization with a malformed identifier
    #[error(
        "invalid ID format '{id}' at row {row}: objectName={object_name} path={path}; \
         expected pattern dzobj_[a-z0-9]{{10}}"
    )]
    InvalidId {
        id: String,
        row: usize,
        object_name: String,
        path: String,
    },

    /// Two records reached finalization with the same identifier
    #[error("duplicate ID '{id}' at row {row}: objectName={object_name} path={path}")]
    DuplicateId {
        id: String,
        row: usize,
        object_name: String,
        path: String,
    },

    /// A published artifact disagrees with the metadata descriptor
    #[error("integrity mismatch in '{path}': metadata says {expected} rows, file has {found}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// Atomic file replacement failed
    #[error("failed to persist '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    /// CSV error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that make a single source fragment unusable without
    /// invalidating the rest of the build.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Error::FileRead { .. } | Error::FragmentParse { .. })
    }
}
