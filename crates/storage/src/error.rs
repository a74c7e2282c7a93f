//! Storage error types.

use std::fmt;

use thiserror::Error;

/// Multi-step operations that can stop halfway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialOperation {
    Upload,
    Deletion,
}

impl fmt::Display for PartialOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Deletion => f.write_str("deletion"),
        }
    }
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A required identifier or argument was empty.
    #[error("\"storage.{operation}()\" should be called with {expected}")]
    MissingArgument {
        operation: &'static str,
        expected: &'static str,
    },

    /// The operation is not available in the current execution context.
    #[error("{0}")]
    UnsupportedOperation(String),

    /// A size descriptor has none of `path`, `width` or `maxWidth`.
    #[error("invalid size object supplied; image upload for this size skipped for file: {filename}")]
    InvalidSizeSpec { filename: String },

    /// A stored document could not be decoded.
    #[error("malformed {collection} document {id}: {source}")]
    Malformed {
        collection: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for the document store.
    #[error("failed to encode document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Opaque failure from the document store, blob store or resizer.
    #[error("backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),

    /// A multi-step operation failed after committing some blob changes.
    ///
    /// Nothing is rolled back: `touched_blobs` lists every key that was
    /// written (upload) or removed (deletion) before the failure.
    #[error("{operation} of file {file_id} stopped after touching {} blob(s): {source}", .touched_blobs.len())]
    Partial {
        operation: PartialOperation,
        file_id: String,
        touched_blobs: Vec<String>,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    pub(crate) fn missing(operation: &'static str, expected: &'static str) -> Self {
        Self::MissingArgument {
            operation,
            expected,
        }
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    pub(crate) fn partial(
        operation: PartialOperation,
        file_id: &str,
        touched_blobs: Vec<String>,
        source: StorageError,
    ) -> Self {
        Self::Partial {
            operation,
            file_id: file_id.to_string(),
            touched_blobs,
            source: Box::new(source),
        }
    }

    /// Whether this failure left blob changes behind.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }

    /// Blob keys committed before a partial failure.
    ///
    /// For uploads these are orphan candidates; for deletions they are the
    /// blobs already gone while the metadata record still exists.
    pub fn touched_blobs(&self) -> &[String] {
        match self {
            Self::Partial { touched_blobs, .. } => touched_blobs,
            _ => &[],
        }
    }

    /// The innermost cause, skipping partial-failure wrappers.
    pub fn root_cause(&self) -> &StorageError {
        match self {
            Self::Partial { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;
