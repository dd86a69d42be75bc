//! Storage error handling
//!
//! Typed failures for the key files, the record caps and reorder input.
//! I/O failures are classified so the front ends can suggest a fix.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::RecordKind;

/// ENOSPC on Linux and macOS
const NO_SPACE_OS_ERROR: i32 = 28;

/// Errors that can occur while reading or writing kiosk state
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Could not create the data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied on '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left to save '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Value could not be encoded as JSON
    #[error("Failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The temp file was written but could not replace the key file
    #[error("Could not move '{from}' into place at '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Per-type record cap reached
    #[error("Cannot add another {kind}: at most {cap} are allowed")]
    CapacityExceeded { kind: RecordKind, cap: usize },

    /// Reorder sequence does not match the stored records
    #[error("Invalid order sequence: {details}")]
    InvalidReorder { details: String },
}

impl StorageError {
    /// Classify a failed write of the file at `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied {
                path,
                source: error,
            }
        } else if is_out_of_space(&error) {
            StorageError::DiskFull {
                path,
                source: error,
            }
        } else {
            StorageError::WriteError {
                path,
                source: error,
            }
        }
    }

    /// Whether the operator can fix this and try the same save again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::DiskFull { .. }
                | StorageError::PermissionDenied { .. }
                | StorageError::CapacityExceeded { .. }
        )
    }

    /// What the operator can do about it, if anything
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => {
                Some("Free up space on the kiosk disk, for example by deleting unused slide images.")
            }
            StorageError::PermissionDenied { .. } => {
                Some("Make the data directory writable for the user running signage.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Set data_dir to a writable location with `signage config set data_dir <path>`.")
            }
            StorageError::CapacityExceeded { .. } => {
                Some("Delete an existing slide of the same type before adding a new one.")
            }
            _ => None,
        }
    }
}

fn is_out_of_space(error: &io::Error) -> bool {
    if error.raw_os_error() == Some(NO_SPACE_OS_ERROR) {
        return true;
    }
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left") || msg.contains("quota exceeded")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
