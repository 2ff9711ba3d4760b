//! Encoded image buffers carried through the verification pipeline.
//!
//! The scanner bridge and the save service exchange images as data URLs
//! (`data:image/jpeg;base64,...`). Inside the crate a buffer is the decoded
//! byte payload behind an `Arc`, so batch snapshots clone cheaply and a
//! buffer's identity can be compared after an await point.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageDataError {
    #[error("Image data is empty")]
    Empty,

    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("Invalid base64 image payload: {0}")]
    Base64(String),
}

/// Opaque encoded image (JPEG, PNG, ...), shared by reference.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer(Arc<[u8]>);

impl ImageBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when both handles point at the same allocation.
    ///
    /// Used to detect that a slot was reassigned while a rotation or bake
    /// was running, so stale output is not written back.
    pub fn same_buffer(&self, other: &ImageBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Parse a `data:<mime>;base64,<payload>` URL or a bare base64 string.
    pub fn from_data_url(input: &str) -> Result<Self, ImageDataError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ImageDataError::Empty);
        }

        let payload = match input.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest
                    .split_once(',')
                    .ok_or_else(|| ImageDataError::MalformedDataUrl("missing ',' separator".into()))?;
                if !meta.ends_with(";base64") {
                    return Err(ImageDataError::MalformedDataUrl(format!(
                        "unsupported encoding in '{meta}'"
                    )));
                }
                data
            }
            None => input,
        };

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageDataError::Base64(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageDataError::Empty);
        }
        Ok(Self::new(bytes))
    }

    /// MIME type sniffed from the payload's magic bytes.
    pub fn mime_type(&self) -> &'static str {
        match image::guess_format(&self.0) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::Jpeg) => "image/jpeg",
            Ok(image::ImageFormat::Tiff) => "image/tiff",
            Ok(image::ImageFormat::Bmp) => "image/bmp",
            Ok(image::ImageFormat::Gif) => "image/gif",
            Ok(image::ImageFormat::WebP) => "image/webp",
            _ => "application/octet-stream",
        }
    }

    /// File extension matching [`Self::mime_type`], for scratch files.
    pub fn extension(&self) -> &'static str {
        match self.mime_type() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/tiff" => "tif",
            "image/bmp" => "bmp",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.0))
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageBuffer({}, {} bytes)", self.mime_type(), self.len())
    }
}

impl Serialize for ImageBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for ImageBuffer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ImageBuffer::from_data_url(&raw).map_err(serde::de::Error::custom)
    }
}

/// Deserialize an optional image where `""` (the bridge's "no side") means absent.
pub fn deserialize_optional_image<'de, D>(deserializer: D) -> Result<Option<ImageBuffer>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => ImageBuffer::from_data_url(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
