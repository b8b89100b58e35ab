use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Hierarchical namespace that groups blobs into a container.
///
/// A path is an ordered list of segments. The empty path is the store root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawBlobPath")]
pub struct BlobPath {
    segments: Vec<String>,
}

/// Unchecked wire form of [`BlobPath`].
#[derive(Deserialize)]
struct RawBlobPath {
    segments: Vec<String>,
}

impl TryFrom<RawBlobPath> for BlobPath {
    type Error = StoreError;

    fn try_from(raw: RawBlobPath) -> StoreResult<Self> {
        for segment in &raw.segments {
            validate_segment(segment)?;
        }
        Ok(Self {
            segments: raw.segments,
        })
    }
}

/// Segments map to directory names, so they must be single, non-special
/// path components.
fn validate_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

impl BlobPath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Return a child path with `segment` appended.
    pub fn add(&self, segment: impl Into<String>) -> StoreResult<Self> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// `path/name`, or just `name` at the root.
    pub fn qualify(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{self}/{name}")
        }
    }

    /// Resolve this path beneath a filesystem directory.
    pub(crate) fn to_fs_path(&self, base: &Path) -> PathBuf {
        let mut out = base.to_path_buf();
        for segment in &self.segments {
            out.push(segment);
        }
        out
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
