use blobseal_store::StoreError;

/// Failure of the pluggable document grammar.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    /// A field the document type cannot do without is absent.
    #[error("missing mandatory field `{0}`")]
    MissingField(String),

    /// The bytes are not a valid document of this type.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The value could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// How an envelope failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionKind {
    /// The blob is shorter than the checksum trailer.
    Truncated { len: usize },
    /// The trailer does not match the body.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// The checksum matched but the compressed body would not inflate.
    Decompression(String),
}

impl std::fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { len } => write!(f, "truncated envelope ({len} bytes)"),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
            ),
            Self::Decompression(reason) => write!(f, "bad compressed body: {reason}"),
        }
    }
}

/// Errors from envelope encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The blob does not exist.
    #[error("blob not found: {blob}")]
    NotFound { blob: String },

    /// Exclusive creation was requested but the blob exists.
    #[error("blob already exists: {blob}")]
    AlreadyExists { blob: String },

    /// Stored bytes were altered or truncated after they were written.
    #[error("corrupted blob {blob}: {kind}")]
    Corrupted { blob: String, kind: CorruptionKind },

    /// Intact bytes that do not form a valid document.
    #[error("failed to parse blob {blob}: {source}")]
    Parse {
        blob: String,
        #[source]
        source: DocumentError,
    },

    /// The decompressed body is larger than the reader allows.
    #[error("document in {blob} exceeds limit of {limit} bytes")]
    DocumentTooLarge { blob: String, limit: usize },

    /// A blob-name pattern without exactly one `{}` placeholder.
    #[error("invalid blob name format {0:?}: expected exactly one `{{}}`")]
    InvalidNameFormat(String),

    /// The compressor itself failed while writing.
    #[error("compression failed: {0}")]
    Compression(String),

    /// Any other failure of the underlying store.
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl FormatError {
    /// Returns `true` for errors that mean stored bytes cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

impl From<StoreError> for FormatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { path, name } => Self::NotFound {
                blob: path.qualify(&name),
            },
            StoreError::AlreadyExists { path, name } => Self::AlreadyExists {
                blob: path.qualify(&name),
            },
            other => Self::Storage(other),
        }
    }
}

/// Result alias for format operations.
pub type FormatResult<T> = Result<T, FormatError>;
