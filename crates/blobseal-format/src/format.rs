use std::io::{self, Read, Write};

use blobseal_store::{BlobContainer, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::checksum::{ChecksumReader, ChecksumWriter, CHECKSUM_LEN};
use crate::compress::{self, Compression};
use crate::config::FormatConfig;
use crate::document::{json_parser, json_serializer, ParseContext, Parser, Serializer};
use crate::error::{CorruptionKind, FormatError, FormatResult};

/// Placeholder substituted with the blob id in a name format.
const NAME_PLACEHOLDER: &str = "{}";

/// Checksummed envelope codec for one document type.
///
/// Envelope layout:
/// ```text
/// [N bytes: body (serialized document, zstd frame when compressed)]
/// [4 bytes: CRC32 of body (big-endian u32)]
/// ```
///
/// Nothing in the envelope says whether the body is compressed; the reader
/// must pass the same [`Compression`] the writer used. On read the checksum
/// is verified before the body is decompressed or parsed, so damaged bytes
/// surface as [`FormatError::Corrupted`] rather than as a decoder failure.
///
/// The codec holds no mutable state and can be shared across threads.
pub struct ChecksumBlobFormat<T> {
    codec: &'static str,
    name_format: String,
    serializer: Serializer<T>,
    parser: Parser<T>,
}

impl<T> ChecksumBlobFormat<T> {
    /// Create a codec from an explicit serializer/parser pair.
    ///
    /// `name_format` maps blob ids to blob names and must contain exactly one
    /// `{}`, e.g. `"snap-{}.dat"`.
    pub fn new(
        codec: &'static str,
        name_format: impl Into<String>,
        serializer: Serializer<T>,
        parser: Parser<T>,
    ) -> FormatResult<Self> {
        let name_format = name_format.into();
        if name_format.matches(NAME_PLACEHOLDER).count() != 1 {
            return Err(FormatError::InvalidNameFormat(name_format));
        }
        Ok(Self {
            codec,
            name_format,
            serializer,
            parser,
        })
    }

    /// Name of the document kind this codec handles.
    pub fn codec(&self) -> &'static str {
        self.codec
    }

    /// Blob name for a document id.
    pub fn blob_name(&self, id: &str) -> String {
        self.name_format.replacen(NAME_PLACEHOLDER, id, 1)
    }

    /// Serialize `value` into a complete envelope.
    ///
    /// Serializer failures are labelled `<codec> document`.
    pub fn encode(&self, value: &T, compression: Compression) -> FormatResult<Vec<u8>> {
        self.encode_as(&format!("{} document", self.codec), value, compression)
    }

    fn encode_as(&self, blob: &str, value: &T, compression: Compression) -> FormatResult<Vec<u8>> {
        let serialized = (self.serializer)(value).map_err(|source| FormatError::Parse {
            blob: blob.to_string(),
            source,
        })?;
        let body = match compression {
            Compression::None => serialized,
            Compression::Zstd { level } => compress::compress(&serialized, level)?,
        };

        let mut out = ChecksumWriter::new(Vec::with_capacity(body.len() + CHECKSUM_LEN));
        out.write_all(&body).map_err(io_error)?;
        let crc = out.checksum();
        let mut envelope = out.into_inner();
        envelope.extend_from_slice(&crc.to_be_bytes());
        Ok(envelope)
    }

    /// Verify an envelope and parse the document inside it.
    ///
    /// `blob` only labels errors and log lines.
    pub fn decode(
        &self,
        blob: &str,
        envelope: &[u8],
        compression: Compression,
        ctx: &ParseContext,
    ) -> FormatResult<T> {
        if envelope.len() < CHECKSUM_LEN {
            warn!(codec = self.codec, blob, len = envelope.len(), "truncated envelope");
            return Err(FormatError::Corrupted {
                blob: blob.to_string(),
                kind: CorruptionKind::Truncated {
                    len: envelope.len(),
                },
            });
        }
        let (body, trailer) = envelope.split_at(envelope.len() - CHECKSUM_LEN);
        let mut trailer_bytes = [0u8; CHECKSUM_LEN];
        trailer_bytes.copy_from_slice(trailer);
        let expected = u32::from_be_bytes(trailer_bytes);

        let mut verifier = ChecksumReader::new(body);
        io::copy(&mut verifier, &mut io::sink()).map_err(io_error)?;
        let actual = verifier.checksum();
        if actual != expected {
            warn!(
                codec = self.codec,
                blob,
                expected = expected,
                actual = actual,
                "checksum mismatch"
            );
            return Err(FormatError::Corrupted {
                blob: blob.to_string(),
                kind: CorruptionKind::ChecksumMismatch { expected, actual },
            });
        }

        let inflated;
        let document: &[u8] = match compression {
            Compression::None => body,
            Compression::Zstd { .. } => {
                inflated = compress::decompress(body, ctx.max_document_size).map_err(|reason| {
                    warn!(codec = self.codec, blob, %reason, "compressed body will not inflate");
                    FormatError::Corrupted {
                        blob: blob.to_string(),
                        kind: CorruptionKind::Decompression(reason),
                    }
                })?;
                &inflated
            }
        };
        if let Some(limit) = ctx.max_document_size {
            if document.len() > limit {
                return Err(FormatError::DocumentTooLarge {
                    blob: blob.to_string(),
                    limit,
                });
            }
        }

        (self.parser)(document, ctx).map_err(|source| FormatError::Parse {
            blob: blob.to_string(),
            source,
        })
    }

    /// Write `value` as the blob for `id`.
    ///
    /// With `fail_if_exists`, an existing blob of that name is left alone and
    /// [`FormatError::AlreadyExists`] is returned.
    pub fn write<C>(
        &self,
        value: &T,
        container: &C,
        id: &str,
        compression: Compression,
        fail_if_exists: bool,
    ) -> FormatResult<()>
    where
        C: BlobContainer + ?Sized,
    {
        let name = self.blob_name(id);
        let envelope = self.encode_as(&container.path().qualify(&name), value, compression)?;
        container.write_blob(&name, &envelope, fail_if_exists)?;
        debug!(
            codec = self.codec,
            path = %container.path(),
            blob = %name,
            len = envelope.len(),
            compressed = compression.is_compressed(),
            "document written"
        );
        Ok(())
    }

    /// Read and verify the blob for `id`.
    pub fn read<C>(
        &self,
        container: &C,
        id: &str,
        compression: Compression,
        ctx: &ParseContext,
    ) -> FormatResult<T>
    where
        C: BlobContainer + ?Sized,
    {
        let name = self.blob_name(id);
        let blob = container.path().qualify(&name);
        let envelope = match ctx.max_document_size {
            None => container.read_blob_bytes(&name)?,
            Some(limit) => {
                // No valid envelope for a document within the limit is longer.
                let bound = compress::max_body_len(limit, compression).saturating_add(CHECKSUM_LEN);
                let mut envelope = Vec::new();
                container
                    .read_blob(&name)?
                    .take(bound as u64 + 1)
                    .read_to_end(&mut envelope)
                    .map_err(io_error)?;
                if envelope.len() > bound {
                    warn!(codec = self.codec, blob = %blob, bound, "blob exceeds envelope bound");
                    return Err(FormatError::DocumentTooLarge { blob, limit });
                }
                envelope
            }
        };
        let value = self.decode(&blob, &envelope, compression, ctx)?;
        debug!(codec = self.codec, blob = %blob, len = envelope.len(), "document read");
        Ok(value)
    }

    /// [`write`](Self::write) with settings taken from `config`.
    pub fn write_with<C>(
        &self,
        value: &T,
        container: &C,
        id: &str,
        config: &FormatConfig,
    ) -> FormatResult<()>
    where
        C: BlobContainer + ?Sized,
    {
        self.write(value, container, id, config.compression, config.fail_if_exists)
    }

    /// [`read`](Self::read) with settings taken from `config`.
    pub fn read_with<C>(
        &self,
        container: &C,
        id: &str,
        config: &FormatConfig,
        ctx: &ParseContext,
    ) -> FormatResult<T>
    where
        C: BlobContainer + ?Sized,
    {
        self.read(container, id, config.compression, ctx)
    }

    /// Check whether the blob for `id` exists.
    pub fn exists<C>(&self, container: &C, id: &str) -> FormatResult<bool>
    where
        C: BlobContainer + ?Sized,
    {
        Ok(container.blob_exists(&self.blob_name(id))?)
    }

    /// Delete the blob for `id`. Returns `true` if it existed.
    pub fn delete<C>(&self, container: &C, id: &str) -> FormatResult<bool>
    where
        C: BlobContainer + ?Sized,
    {
        Ok(container.delete_blob(&self.blob_name(id))?)
    }
}

impl<T: Serialize + DeserializeOwned + 'static> ChecksumBlobFormat<T> {
    /// Codec that stores documents as JSON.
    pub fn json(codec: &'static str, name_format: impl Into<String>) -> FormatResult<Self> {
        Self::new(codec, name_format, json_serializer(), json_parser())
    }
}

impl<T> std::fmt::Debug for ChecksumBlobFormat<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumBlobFormat")
            .field("codec", &self.codec)
            .field("name_format", &self.name_format)
            .finish()
    }
}

fn io_error(err: io::Error) -> FormatError {
    FormatError::Storage(StoreError::Io(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use blobseal_store::{BlobPath, BlobStore, InMemoryBlobStore};
    use serde::Deserialize;

    use crate::error::DocumentError;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct BlobObj {
        text: String,
    }

    fn format() -> ChecksumBlobFormat<BlobObj> {
        ChecksumBlobFormat::json("blob", "{}").unwrap()
    }

    fn obj(text: &str) -> BlobObj {
        BlobObj {
            text: text.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Envelope layout
    // -----------------------------------------------------------------------

    #[test]
    fn envelope_is_body_then_big_endian_crc() {
        let envelope = format().encode(&obj("hi"), Compression::None).unwrap();
        let body = br#"{"text":"hi"}"#;
        assert_eq!(&envelope[..body.len()], body);
        assert_eq!(envelope.len(), body.len() + CHECKSUM_LEN);
        let trailer: [u8; 4] = envelope[body.len()..].try_into().unwrap();
        assert_eq!(u32::from_be_bytes(trailer), crate::checksum::crc32(body));
    }

    #[test]
    fn decode_roundtrip_both_encodings() {
        let f = format();
        for compression in [Compression::None, Compression::default_zstd()] {
            let envelope = f.encode(&obj("round"), compression).unwrap();
            let back = f
                .decode("x", &envelope, compression, &ParseContext::default())
                .unwrap();
            assert_eq!(back, obj("round"));
        }
    }

    #[test]
    fn decode_empty_envelope_is_truncated() {
        let err = format()
            .decode("x", &[], Compression::None, &ParseContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::Corrupted {
                kind: CorruptionKind::Truncated { len: 0 },
                ..
            }
        ));
    }

    #[test]
    fn trailer_only_envelope_checks_empty_body() {
        // An empty body has CRC 0, so four zero bytes verify and then fail to parse.
        let err = format()
            .decode("x", &[0, 0, 0, 0], Compression::None, &ParseContext::default())
            .unwrap_err();
        assert!(matches!(err, FormatError::Parse { .. }));
    }

    #[test]
    fn damaged_compressed_body_reports_corruption_not_decoder_error() {
        let f = format();
        let mut envelope = f
            .encode(&obj(&"zzz".repeat(100)), Compression::default_zstd())
            .unwrap();
        envelope[0] ^= 0xff;
        let err = f
            .decode("x", &envelope, Compression::default_zstd(), &ParseContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::Corrupted {
                kind: CorruptionKind::ChecksumMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn checksum_valid_garbage_with_compression_is_decompression_corruption() {
        let body = b"not a zstd frame";
        let mut envelope = body.to_vec();
        envelope.extend_from_slice(&crate::checksum::crc32(body).to_be_bytes());
        let err = format()
            .decode("x", &envelope, Compression::default_zstd(), &ParseContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::Corrupted {
                kind: CorruptionKind::Decompression(_),
                ..
            }
        ));
    }

    #[test]
    fn size_limit_applies_to_both_encodings() {
        let f = format();
        let ctx = ParseContext {
            max_document_size: Some(64),
        };
        let big = obj(&"a".repeat(1000));
        for compression in [Compression::None, Compression::default_zstd()] {
            let envelope = f.encode(&big, compression).unwrap();
            let err = f.decode("x", &envelope, compression, &ctx).unwrap_err();
            assert!(
                matches!(err, FormatError::DocumentTooLarge { limit: 64, .. }),
                "{compression:?}: {err}"
            );
        }
        let envelope = f.encode(&big, Compression::None).unwrap();
        assert!(f
            .decode("x", &envelope, Compression::None, &ParseContext::unbounded())
            .is_ok());
    }

    // -----------------------------------------------------------------------
    // Naming
    // -----------------------------------------------------------------------

    #[test]
    fn blob_name_substitutes_id() {
        let f = ChecksumBlobFormat::<BlobObj>::json("snapshot", "snap-{}.dat").unwrap();
        assert_eq!(f.blob_name("abc"), "snap-abc.dat");
        assert_eq!(f.codec(), "snapshot");
    }

    #[test]
    fn name_format_needs_one_placeholder() {
        for bad in ["snap.dat", "{}-{}"] {
            let err = ChecksumBlobFormat::<BlobObj>::json("blob", bad).unwrap_err();
            assert!(matches!(err, FormatError::InvalidNameFormat(_)));
        }
    }

    // -----------------------------------------------------------------------
    // Store-facing operations
    // -----------------------------------------------------------------------

    #[test]
    fn write_read_exists_delete() {
        let store = InMemoryBlobStore::new();
        let c = store.blob_container(&BlobPath::root()).unwrap();
        let f = ChecksumBlobFormat::<BlobObj>::json("meta", "meta-{}.dat").unwrap();

        assert!(!f.exists(c.as_ref(), "1").unwrap());
        f.write(&obj("one"), c.as_ref(), "1", Compression::None, false)
            .unwrap();
        assert!(c.blob_exists("meta-1.dat").unwrap());
        assert!(f.exists(c.as_ref(), "1").unwrap());
        assert_eq!(
            f.read(c.as_ref(), "1", Compression::None, &ParseContext::default())
                .unwrap(),
            obj("one")
        );
        assert!(f.delete(c.as_ref(), "1").unwrap());
        assert!(!f.delete(c.as_ref(), "1").unwrap());
    }

    #[test]
    fn read_missing_is_not_found() {
        let store = InMemoryBlobStore::new();
        let c = store
            .blob_container(&BlobPath::root().add("snaps").unwrap())
            .unwrap();
        let err = format()
            .read(c.as_ref(), "nope", Compression::None, &ParseContext::default())
            .unwrap_err();
        assert!(matches!(err, FormatError::NotFound { ref blob } if blob == "snaps/nope"));
    }

    #[test]
    fn fail_if_exists_surfaces_already_exists() {
        let store = InMemoryBlobStore::new();
        let c = store.blob_container(&BlobPath::root()).unwrap();
        let f = format();
        f.write(&obj("a"), c.as_ref(), "x", Compression::None, true)
            .unwrap();
        let err = f
            .write(&obj("b"), c.as_ref(), "x", Compression::None, true)
            .unwrap_err();
        assert!(matches!(err, FormatError::AlreadyExists { .. }));
        assert_eq!(
            f.read(c.as_ref(), "x", Compression::None, &ParseContext::default())
                .unwrap(),
            obj("a")
        );
    }

    #[test]
    fn config_driven_write_and_read() {
        let store = InMemoryBlobStore::new();
        let c = store.blob_container(&BlobPath::root()).unwrap();
        let f = format();
        let config = FormatConfig::default();
        f.write_with(&obj("cfg"), c.as_ref(), "c", &config).unwrap();
        assert_eq!(
            f.read_with(c.as_ref(), "c", &config, &ParseContext::default())
                .unwrap(),
            obj("cfg")
        );
    }

    #[test]
    fn custom_serializer_and_parser() {
        // A line-oriented grammar: the document is the raw text.
        let serializer: Serializer<BlobObj> =
            Arc::new(|v: &BlobObj| Ok(v.text.clone().into_bytes()));
        let parser: Parser<BlobObj> = Arc::new(|bytes: &[u8], _ctx: &ParseContext| {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DocumentError::Malformed(e.to_string()))?;
            if text.is_empty() {
                return Err(DocumentError::MissingField("text".into()));
            }
            Ok(obj(text))
        });
        let f = ChecksumBlobFormat::new("plain", "{}.txt", serializer, parser).unwrap();

        let envelope = f.encode(&obj("plain text"), Compression::None).unwrap();
        assert_eq!(&envelope[..10], b"plain text");
        assert_eq!(
            f.decode("x", &envelope, Compression::None, &ParseContext::default())
                .unwrap(),
            obj("plain text")
        );

        let empty = f.encode(&obj(""), Compression::None).unwrap();
        let err = f
            .decode("x", &empty, Compression::None, &ParseContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::Parse {
                source: DocumentError::MissingField(_),
                ..
            }
        ));
    }

    #[test]
    fn serializer_failure_is_reported() {
        let serializer: Serializer<BlobObj> =
            Arc::new(|_: &BlobObj| Err(DocumentError::Serialize("refused".into())));
        let f = ChecksumBlobFormat::new("bad", "{}", serializer, json_parser()).unwrap();
        let err = f.encode(&obj("x"), Compression::None).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Parse {
                ref blob,
                source: DocumentError::Serialize(_),
            } if blob == "bad document"
        ));

        let store = InMemoryBlobStore::new();
        let c = store
            .blob_container(&BlobPath::root().add("snaps").unwrap())
            .unwrap();
        let err = f
            .write(&obj("x"), c.as_ref(), "1", Compression::None, false)
            .unwrap_err();
        assert!(matches!(err, FormatError::Parse { ref blob, .. } if blob == "snaps/1"));
        assert!(!c.blob_exists("1").unwrap());
    }

    #[test]
    fn oversized_blob_rejected_before_verification() {
        let store = InMemoryBlobStore::new();
        let c = store.blob_container(&BlobPath::root()).unwrap();
        let ctx = ParseContext {
            max_document_size: Some(64),
        };
        // Not an envelope at all: the length alone rules it out.
        c.write_blob("huge", &vec![0xAB; 64 * 1024], false).unwrap();
        for compression in [Compression::None, Compression::default_zstd()] {
            let err = format().read(c.as_ref(), "huge", compression, &ctx).unwrap_err();
            assert!(
                matches!(err, FormatError::DocumentTooLarge { ref blob, limit: 64 } if blob == "huge"),
                "{err}"
            );
        }

        let f = format();
        f.write(&obj(&"q".repeat(40)), c.as_ref(), "fits", Compression::None, false)
            .unwrap();
        assert_eq!(
            f.read(c.as_ref(), "fits", Compression::None, &ctx).unwrap(),
            obj(&"q".repeat(40))
        );
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", format());
        assert!(debug.contains("ChecksumBlobFormat"));
        assert!(debug.contains("codec"));
    }
}
