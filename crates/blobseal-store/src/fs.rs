use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{validate_blob_name, StoreError, StoreResult};
use crate::path::BlobPath;
use crate::traits::{BlobContainer, BlobMetadata, BlobStore};

/// Prefix of in-flight temporary files. Such files are never listed or read.
const TEMP_PREFIX: &str = ".pending-";

/// Configuration for [`FsBlobStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsBlobStoreConfig {
    /// Buffer size for reads and writes, in bytes (default: 100 KiB).
    pub buffer_size: usize,
    /// Reject every mutation and never create directories.
    pub readonly: bool,
}

impl Default for FsBlobStoreConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100 * 1024,
            readonly: false,
        }
    }
}

impl FsBlobStoreConfig {
    /// A read-only configuration with the default buffer size.
    pub fn readonly() -> Self {
        Self {
            readonly: true,
            ..Default::default()
        }
    }
}

/// Blob store backed by a directory tree.
///
/// Each [`BlobPath`] maps to a directory beneath the root and each blob to a
/// regular file. Writes land in a temporary file in the target directory and
/// are renamed into place once synced, so readers see either the old blob or
/// the complete new one.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    config: FsBlobStoreConfig,
}

impl FsBlobStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// A read-only store requires `root` to exist already.
    pub fn open(root: impl AsRef<Path>, config: FsBlobStoreConfig) -> StoreResult<Self> {
        if config.buffer_size == 0 {
            return Err(StoreError::InvalidConfig("buffer_size must be non-zero".into()));
        }
        let root = root.as_ref().to_path_buf();
        if config.readonly {
            if !root.is_dir() {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("read-only store root {} does not exist", root.display()),
                )));
            }
        } else {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root, config })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration.
    pub fn config(&self) -> &FsBlobStoreConfig {
        &self.config
    }
}

impl BlobStore for FsBlobStore {
    fn blob_container(&self, path: &BlobPath) -> StoreResult<Arc<dyn BlobContainer>> {
        let dir = path.to_fs_path(&self.root);
        if !self.config.readonly {
            fs::create_dir_all(&dir)?;
        }
        Ok(Arc::new(FsBlobContainer {
            path: path.clone(),
            dir,
            config: self.config.clone(),
        }))
    }
}

/// Directory-backed blob container.
#[derive(Debug)]
pub struct FsBlobContainer {
    path: BlobPath,
    dir: PathBuf,
    config: FsBlobStoreConfig,
}

impl FsBlobContainer {
    /// Directory holding this container's blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_file(&self, name: &str) -> StoreResult<PathBuf> {
        validate_blob_name(name)?;
        if name.starts_with(TEMP_PREFIX) {
            return Err(StoreError::InvalidBlobName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    fn not_found(&self, name: &str) -> StoreError {
        StoreError::NotFound {
            path: self.path.clone(),
            name: name.to_string(),
        }
    }

    fn already_exists(&self, name: &str) -> StoreError {
        StoreError::AlreadyExists {
            path: self.path.clone(),
            name: name.to_string(),
        }
    }

    /// Rename a synced temp file onto `target`, then sync the directory so
    /// the rename itself is durable.
    fn commit(
        &self,
        temp: NamedTempFile,
        target: &Path,
        name: &str,
        fail_if_exists: bool,
    ) -> StoreResult<()> {
        if fail_if_exists {
            temp.persist_noclobber(target).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    self.already_exists(name)
                } else {
                    StoreError::Io(e.error)
                }
            })?;
        } else {
            temp.persist(target).map_err(|e| StoreError::Io(e.error))?;
        }
        sync_dir(&self.dir)?;
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl BlobContainer for FsBlobContainer {
    fn path(&self) -> &BlobPath {
        &self.path
    }

    fn blob_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.blob_file(name)?.is_file())
    }

    fn read_blob(&self, name: &str) -> StoreResult<Box<dyn Read + Send>> {
        let file_path = self.blob_file(name)?;
        let file = match File::open(&file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(self.not_found(name)),
            Err(e) => return Err(e.into()),
        };
        // Sub-container directories share the namespace but are not blobs.
        if !file.metadata()?.is_file() {
            return Err(self.not_found(name));
        }
        Ok(Box::new(BufReader::with_capacity(self.config.buffer_size, file)))
    }

    fn write_blob(&self, name: &str, data: &[u8], fail_if_exists: bool) -> StoreResult<()> {
        if self.config.readonly {
            return Err(StoreError::ReadOnly);
        }
        let target = self.blob_file(name)?;
        if fail_if_exists && target.exists() {
            return Err(self.already_exists(name));
        }

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        {
            let mut writer = BufWriter::with_capacity(self.config.buffer_size, temp.as_file());
            writer.write_all(data)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        // A concurrent creator may have won since the check above.
        self.commit(temp, &target, name, fail_if_exists)?;

        debug!(path = %self.path, name, len = data.len(), "blob written");
        Ok(())
    }

    fn delete_blob(&self, name: &str) -> StoreResult<bool> {
        if self.config.readonly {
            return Err(StoreError::ReadOnly);
        }
        let target = self.blob_file(name)?;
        match fs::remove_file(&target) {
            Ok(()) => {
                debug!(path = %self.path, name, "blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_blobs_by_prefix(&self, prefix: &str) -> StoreResult<BTreeMap<String, BlobMetadata>> {
        let mut listing = BTreeMap::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // A read-only store never creates directories, so an absent one
            // is simply an empty container.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listing),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) || !name.starts_with(prefix) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            listing.insert(name.clone(), BlobMetadata::new(name, metadata.len()));
        }
        Ok(listing)
    }
}
