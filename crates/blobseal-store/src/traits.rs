use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::path::BlobPath;

/// Name and size of a stored blob, as reported by listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobMetadata {
    pub name: String,
    pub length: u64,
}

impl BlobMetadata {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Name-addressed blob storage.
///
/// A store hands out containers, one per [`BlobPath`]. Containers are created
/// lazily; asking twice for the same path yields views of the same blobs.
pub trait BlobStore: Send + Sync {
    /// Return the container for `path`, creating the namespace if needed.
    fn blob_container(&self, path: &BlobPath) -> StoreResult<Arc<dyn BlobContainer>>;
}

/// A flat namespace of blobs under one path.
///
/// All implementations must satisfy these invariants:
/// - Every operation is whole-blob. There are no partial reads or writes.
/// - A reader never observes a write in progress: a blob is either absent,
///   the previous version, or the complete new version.
/// - Concurrent writers to the same name race; the last one to finish wins.
/// - The container never interprets blob contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlobContainer: Send + Sync {
    /// The path this container lives at.
    fn path(&self) -> &BlobPath;

    /// Check whether a blob exists.
    fn blob_exists(&self, name: &str) -> StoreResult<bool>;

    /// Open a blob for reading.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if the
    /// blob does not exist.
    fn read_blob(&self, name: &str) -> StoreResult<Box<dyn Read + Send>>;

    /// Write a whole blob.
    ///
    /// With `fail_if_exists` set, an existing blob of the same name yields
    /// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists) and is
    /// left untouched. Otherwise the blob is replaced.
    fn write_blob(&self, name: &str, data: &[u8], fail_if_exists: bool) -> StoreResult<()>;

    /// Delete a blob. Returns `true` if the blob existed.
    fn delete_blob(&self, name: &str) -> StoreResult<bool>;

    /// List blobs whose names start with `prefix`, keyed by name.
    fn list_blobs_by_prefix(&self, prefix: &str) -> StoreResult<BTreeMap<String, BlobMetadata>>;

    /// Read a whole blob into memory.
    fn read_blob_bytes(&self, name: &str) -> StoreResult<Vec<u8>> {
        let mut reader = self.read_blob(name)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// List every blob in the container.
    fn list_blobs(&self) -> StoreResult<BTreeMap<String, BlobMetadata>> {
        self.list_blobs_by_prefix("")
    }
}
