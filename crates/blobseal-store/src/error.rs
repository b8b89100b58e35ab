use crate::path::BlobPath;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob does not exist.
    #[error("blob not found: {}", .path.qualify(.name))]
    NotFound { path: BlobPath, name: String },

    /// Exclusive creation was requested but the blob already exists.
    #[error("blob already exists: {}", .path.qualify(.name))]
    AlreadyExists { path: BlobPath, name: String },

    /// The blob name is empty or contains a path separator.
    #[error("invalid blob name: {0:?}")]
    InvalidBlobName(String),

    /// A path segment is empty or contains a path separator.
    #[error("invalid path segment: {0:?}")]
    InvalidPath(String),

    /// The store configuration cannot be used.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Reject names that cannot address a single blob inside a container.
pub(crate) fn validate_blob_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(StoreError::InvalidBlobName(name.to_string()));
    }
    Ok(())
}
