//! Image payloads exchanged with the synthesis boundary.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading an image payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("not a base64 data URL")]
    NotDataUrl,

    #[error("image data is not valid base64")]
    InvalidBase64,

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
}

/// Base64-encoded image bytes with their MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ImagePayload {
    /// Encode raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedType` unless `mime_type` is an image type.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, ImageError> {
        let mime_type = normalize_mime(mime_type)?;
        Ok(Self {
            mime_type,
            data: STANDARD.encode(bytes),
        })
    }

    /// Parse a `data:<mime>;base64,<data>` URL, as produced by file readers
    /// and canvas snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a base64 image data URL.
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url.strip_prefix("data:").ok_or(ImageError::NotDataUrl)?;
        let (header, data) = rest.split_once(',').ok_or(ImageError::NotDataUrl)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(ImageError::NotDataUrl)?;
        let mime_type = normalize_mime(mime_type)?;

        STANDARD
            .decode(data)
            .map_err(|_| ImageError::InvalidBase64)?;

        Ok(Self {
            mime_type,
            data: data.to_string(),
        })
    }

    /// Render back to a data URL for display.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

fn normalize_mime(mime_type: &str) -> Result<String, ImageError> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.starts_with("image/") && essence.len() > "image/".len() {
        Ok(essence)
    } else {
        Err(ImageError::UnsupportedType(mime_type.to_string()))
    }
}

/// Where a source or garment image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Bytes already in hand (upload or camera frame).
    Inline(ImagePayload),
    /// A remote image to be fetched (product photo or model preset).
    Remote(String),
}

impl ImageSource {
    /// Value suitable for an `<img src>` attribute.
    #[must_use]
    pub fn display_src(&self) -> String {
        match self {
            Self::Inline(payload) => payload.to_data_url(),
            Self::Remote(url) => url.clone(),
        }
    }
}
