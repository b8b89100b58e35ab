use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};

/// Default zstd level, matching what pack files use.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Body compression applied before checksumming.
///
/// The choice is not recorded in the envelope: a blob must be read back with
/// the same setting it was written with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compression {
    /// Store the serialized body as is.
    #[default]
    None,
    /// zstd frame at the given level.
    Zstd { level: i32 },
}

impl Compression {
    /// zstd at [`DEFAULT_ZSTD_LEVEL`].
    pub const fn default_zstd() -> Self {
        Self::Zstd {
            level: DEFAULT_ZSTD_LEVEL,
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Compress `data` with zstd.
pub fn compress(data: &[u8], level: i32) -> FormatResult<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| FormatError::Compression(e.to_string()))
}

/// Upper bound on the stored body of a `len`-byte document.
pub fn max_body_len(len: usize, compression: Compression) -> usize {
    match compression {
        Compression::None => len,
        Compression::Zstd { .. } => zstd::zstd_safe::compress_bound(len),
    }
}

/// Decompress a zstd frame.
///
/// With a `limit`, output stops one byte past it: a result longer than
/// `limit` means the frame inflates beyond the limit. Decoder failures are
/// returned as a message; the caller decides how to classify them.
pub fn decompress(data: &[u8], limit: Option<usize>) -> Result<Vec<u8>, String> {
    let decoder = zstd::stream::read::Decoder::new(data).map_err(|e| e.to_string())?;
    // One byte past the limit is enough to detect an oversized frame
    // without inflating it completely.
    let mut reader: Box<dyn Read + '_> = match limit {
        Some(limit) => Box::new(decoder.take(limit as u64 + 1)),
        None => Box::new(decoder),
    };
    let mut out = Vec::new();
    reader.read_to_end(&mut out).map_err(|e| e.to_string())?;
    Ok(out)
}
