//! Checksum-verified document envelopes for blobseal.
//!
//! A document is serialized by a pluggable grammar, optionally zstd
//! compressed, and sealed with a CRC-32 trailer before being written as a
//! single blob. Reading verifies the trailer before anything else touches the
//! bytes, so storage damage shows up as a typed corruption error instead of a
//! decoder crash or a silently wrong value.
//!
//! # Architecture
//!
//! - **ChecksumWriter / ChecksumReader**: I/O adapters that CRC every byte
//! - **Compression**: opt-in zstd step applied before checksumming
//! - **ChecksumBlobFormat**: serialize, compress, seal, store; and the reverse
//! - **FormatConfig**: one explicit write/read policy per blob family
//!
//! # Envelope
//!
//! ```text
//! [ body ][ crc32(body): u32 big-endian ]
//! ```
//!
//! No magic, no length, no compression flag. The caller pairs a blob-name
//! convention with a fixed compression choice.

pub mod checksum;
pub mod compress;
pub mod config;
pub mod document;
pub mod error;
pub mod format;

pub use checksum::{crc32, ChecksumReader, ChecksumWriter, CHECKSUM_LEN};
pub use compress::{Compression, DEFAULT_ZSTD_LEVEL};
pub use config::FormatConfig;
pub use document::{json_parser, json_serializer, ParseContext, Parser, Serializer};
pub use error::{CorruptionKind, DocumentError, FormatError, FormatResult};
pub use format::ChecksumBlobFormat;
