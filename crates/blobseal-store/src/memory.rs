use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::{Arc, RwLock};

use bytes::{Buf, Bytes};

use crate::error::{validate_blob_name, StoreError, StoreResult};
use crate::path::BlobPath;
use crate::traits::{BlobContainer, BlobMetadata, BlobStore};

type BlobMap = HashMap<BlobPath, HashMap<String, Bytes>>;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. All blobs are held behind a single
/// `RwLock`; containers handed out for the same path share the same map.
/// Reads hand out cheap `Bytes` clones, so an overwrite never disturbs a
/// reader that already opened the previous version.
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<BlobMap>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of blobs across all containers.
    pub fn blob_count(&self) -> usize {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .flat_map(HashMap::values)
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Remove every blob and container.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn blob_container(&self, path: &BlobPath) -> StoreResult<Arc<dyn BlobContainer>> {
        self.blobs
            .write()
            .expect("lock poisoned")
            .entry(path.clone())
            .or_default();
        Ok(Arc::new(InMemoryBlobContainer {
            path: path.clone(),
            blobs: Arc::clone(&self.blobs),
        }))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.blob_count())
            .finish()
    }
}

/// Container view over an [`InMemoryBlobStore`].
#[derive(Debug)]
pub struct InMemoryBlobContainer {
    path: BlobPath,
    blobs: Arc<RwLock<BlobMap>>,
}

impl InMemoryBlobContainer {
    fn not_found(&self, name: &str) -> StoreError {
        StoreError::NotFound {
            path: self.path.clone(),
            name: name.to_string(),
        }
    }
}

impl BlobContainer for InMemoryBlobContainer {
    fn path(&self) -> &BlobPath {
        &self.path
    }

    fn blob_exists(&self, name: &str) -> StoreResult<bool> {
        validate_blob_name(name)?;
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map
            .get(&self.path)
            .is_some_and(|blobs| blobs.contains_key(name)))
    }

    fn read_blob(&self, name: &str) -> StoreResult<Box<dyn Read + Send>> {
        validate_blob_name(name)?;
        let map = self.blobs.read().expect("lock poisoned");
        let data = map
            .get(&self.path)
            .and_then(|blobs| blobs.get(name))
            .cloned()
            .ok_or_else(|| self.not_found(name))?;
        Ok(Box::new(data.reader()))
    }

    fn write_blob(&self, name: &str, data: &[u8], fail_if_exists: bool) -> StoreResult<()> {
        validate_blob_name(name)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        let blobs = map.entry(self.path.clone()).or_default();
        if fail_if_exists && blobs.contains_key(name) {
            return Err(StoreError::AlreadyExists {
                path: self.path.clone(),
                name: name.to_string(),
            });
        }
        blobs.insert(name.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    fn delete_blob(&self, name: &str) -> StoreResult<bool> {
        validate_blob_name(name)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map
            .get_mut(&self.path)
            .is_some_and(|blobs| blobs.remove(name).is_some()))
    }

    fn list_blobs_by_prefix(&self, prefix: &str) -> StoreResult<BTreeMap<String, BlobMetadata>> {
        let map = self.blobs.read().expect("lock poisoned");
        let listing = map
            .get(&self.path)
            .into_iter()
            .flat_map(|blobs| blobs.iter())
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, data)| (name.clone(), BlobMetadata::new(name.clone(), data.len() as u64)))
            .collect();
        Ok(listing)
    }
}
