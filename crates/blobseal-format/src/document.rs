use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DocumentError;

/// Default cap on the size of a decoded document body: 64 MiB.
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 64 * 1024 * 1024;

/// Turns a value into the bytes of its structured form.
pub type Serializer<T> = Arc<dyn Fn(&T) -> Result<Vec<u8>, DocumentError> + Send + Sync>;

/// Rebuilds a value from the bytes of its structured form.
pub type Parser<T> = Arc<dyn Fn(&[u8], &ParseContext) -> Result<T, DocumentError> + Send + Sync>;

/// Reader-side settings handed to every parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseContext {
    /// Largest body the reader is willing to materialize, after
    /// decompression. `None` disables the check.
    pub max_document_size: Option<usize>,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            max_document_size: Some(DEFAULT_MAX_DOCUMENT_SIZE),
        }
    }
}

impl ParseContext {
    /// A context without a size limit.
    pub fn unbounded() -> Self {
        Self {
            max_document_size: None,
        }
    }
}

/// JSON serializer for any `Serialize` type.
pub fn json_serializer<T: Serialize + 'static>() -> Serializer<T> {
    Arc::new(|value: &T| {
        serde_json::to_vec(value).map_err(|e| DocumentError::Serialize(e.to_string()))
    })
}

/// JSON parser for any `DeserializeOwned` type.
///
/// serde reports an absent required field as a data error whose message
/// starts with "missing field"; that case becomes
/// [`DocumentError::MissingField`] so callers can tell it from garbage.
pub fn json_parser<T: DeserializeOwned + 'static>() -> Parser<T> {
    Arc::new(|bytes: &[u8], _ctx: &ParseContext| {
        serde_json::from_slice(bytes).map_err(|e| match missing_field(&e) {
            Some(field) => DocumentError::MissingField(field),
            None => DocumentError::Malformed(e.to_string()),
        })
    })
}

fn missing_field(err: &serde_json::Error) -> Option<String> {
    if !err.is_data() {
        return None;
    }
    let msg = err.to_string();
    let rest = msg.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}
