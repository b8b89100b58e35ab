//! Name-addressed blob storage for blobseal.
//!
//! A [`BlobStore`] hands out [`BlobContainer`]s, one per hierarchical
//! [`BlobPath`]. A container is a flat namespace of opaque byte blobs that
//! supports whole-blob write, read, list-by-prefix and delete. The store never
//! interprets blob contents; envelopes and checksums live in
//! `blobseal-format`.
//!
//! # Storage Backends
//!
//! - [`FsBlobStore`] -- directory tree on local disk, atomic renames
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Every operation is whole-blob; there are no partial reads or writes.
//! 2. Readers never observe a half-written blob.
//! 3. Concurrent writers to one name race, and the last to finish wins.
//! 4. Containers are created lazily on first access.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FsBlobContainer, FsBlobStore, FsBlobStoreConfig};
pub use memory::{InMemoryBlobContainer, InMemoryBlobStore};
pub use path::BlobPath;
pub use traits::{BlobContainer, BlobMetadata, BlobStore};
