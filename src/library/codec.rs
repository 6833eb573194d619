//! Binary file <-> string codec.
//!
//! Templates are persisted as `data:` URLs so the media type travels inside
//! the encoded string and decoding needs no side channel.

use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

/// Media type used when a file carries none
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Media type assumed when a data URL header names none
const FALLBACK_DECODED_MEDIA_TYPE: &str = "text/plain";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("missing data: prefix")]
    MissingPrefix,

    #[error("missing payload separator")]
    MissingSeparator,

    #[error("payload is not base64-encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// An in-memory file: display name, media type and raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl BinaryFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Load a file from disk, inferring its media type from the extension
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Path has no file name: {}", path.display()))?;

        let media_type = media_type_for(&name).unwrap_or(DEFAULT_MEDIA_TYPE);
        Ok(Self::new(name, media_type, bytes))
    }

    /// Lowercased extension of the display name, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess a media type from a file name's extension
pub fn media_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_string_lossy()
        .to_lowercase();

    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "txt" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// A self-describing `data:<media-type>;base64,<payload>` string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedBinary(String);

impl EncodedBinary {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EncodedBinary {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EncodedBinary {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Encode a file, embedding its media type
pub fn encode(file: &BinaryFile) -> EncodedBinary {
    let media_type = if file.media_type.trim().is_empty() {
        DEFAULT_MEDIA_TYPE
    } else {
        file.media_type.as_str()
    };

    EncodedBinary(format!(
        "data:{};base64,{}",
        media_type,
        STANDARD.encode(&file.bytes)
    ))
}

/// Strictly decode an encoded file under the given display name
pub fn try_decode(encoded: &EncodedBinary, name: &str) -> Result<BinaryFile, CodecError> {
    let rest = encoded
        .as_str()
        .strip_prefix("data:")
        .ok_or(CodecError::MissingPrefix)?;

    let (header, payload) = rest.split_once(',').ok_or(CodecError::MissingSeparator)?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or(CodecError::NotBase64)?;

    let media_type = if media_type.is_empty() {
        FALLBACK_DECODED_MEDIA_TYPE
    } else {
        media_type
    };

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;

    Ok(BinaryFile::new(name, media_type, bytes))
}

/// Decode, degrading to an empty `text/plain` file when the input is malformed.
///
/// Callers that need to know whether content is real must use [`try_decode`].
pub fn decode(encoded: &EncodedBinary, name: &str) -> BinaryFile {
    try_decode(encoded, name).unwrap_or_else(|e| {
        tracing::warn!(file = name, error = %e, "Error reconstructing file from storage");
        BinaryFile::new(name, FALLBACK_DECODED_MEDIA_TYPE, Vec::new())
    })
}
