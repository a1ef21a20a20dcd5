//! Media references — binary inputs carried as `data:<mimetype>;base64,<payload>`.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// A decoded-on-demand binary payload. The payload stays Base64 so it can be
/// forwarded to providers without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaReference {
    pub mime_type: String,
    pub data: String,
}

impl MediaReference {
    /// Parse a data URI. Only the Base64 form is accepted, and the payload
    /// must be valid standard Base64.
    pub fn parse(uri: &str) -> Result<Self, String> {
        let rest = uri
            .strip_prefix(DATA_PREFIX)
            .ok_or_else(|| "must start with 'data:'".to_string())?;
        let idx = rest
            .find(BASE64_MARKER)
            .ok_or_else(|| "must contain ';base64,'".to_string())?;

        let mime_type = rest[..idx].trim();
        let data = &rest[idx + BASE64_MARKER.len()..];

        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(format!("invalid MIME type '{}'", mime_type));
        }
        if data.is_empty() {
            return Err("payload is empty".to_string());
        }
        BASE64
            .decode(data)
            .map_err(|e| format!("payload is not valid Base64: {}", e))?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    /// Build a reference from raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Decode the payload.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data)
    }

    /// Decoded size, computed from the Base64 length and padding.
    pub fn byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn to_data_uri(&self) -> String {
        format!("{}{}{}{}", DATA_PREFIX, self.mime_type, BASE64_MARKER, self.data)
    }
}

// Never print payloads in logs or debug output of requests.
impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.mime_type, self.byte_len())
    }
}

/// Guess a MIME type from a file extension. Used by the CLI when reading
/// uploads from disk.
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
