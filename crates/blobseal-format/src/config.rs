use serde::{Deserialize, Serialize};

use crate::compress::Compression;

/// Write-side policy for a family of blobs.
///
/// Readers must use the same `compression` the blobs were written with;
/// pairing one config with one name format keeps the two in step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Body compression applied on write and expected on read.
    pub compression: Compression,
    /// Refuse to replace an existing blob.
    pub fail_if_exists: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default_zstd(),
            fail_if_exists: false,
        }
    }
}

impl FormatConfig {
    /// Uncompressed bodies, overwrite allowed.
    pub fn uncompressed() -> Self {
        Self {
            compression: Compression::None,
            ..Default::default()
        }
    }
}
