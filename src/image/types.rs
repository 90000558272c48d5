//! Core types for uploaded and generated images.

use crate::error::{Result, StylizeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
    /// HEIC, HEVC-coded HEIF as produced by phone cameras.
    Heic,
    /// Generic HEIF container.
    Heif,
}

impl ImageFormat {
    /// Every format on the upload allow-list.
    pub const ALL: [ImageFormat; 5] = [Self::Png, Self::Jpeg, Self::WebP, Self::Heic, Self::Heif];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Heic => "heic",
            Self::Heif => "heif",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
        }
    }

    /// Looks up an allow-listed format by MIME type (case-insensitive).
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.mime_type() == mime)
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        // ISO-BMFF: ....ftyp<brand>
        if &data[4..8] == b"ftyp" {
            return match &data[8..12] {
                b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx" => Some(Self::Heic),
                b"mif1" | b"msf1" | b"heif" => Some(Self::Heif),
                _ => None,
            };
        }

        None
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// A file chosen by the user, with the MIME type the picker reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Location of the file.
    pub path: PathBuf,
    /// MIME type as reported by the picker. Empty when unknown.
    pub mime_type: String,
}

impl SelectedFile {
    /// Creates a selection with an explicit MIME type.
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Creates a selection, deriving the MIME type from the file extension.
    ///
    /// Unknown extensions produce `application/octet-stream`, which the
    /// allow-list later rejects.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream")
            .to_string();
        Self { path, mime_type }
    }

    /// Returns the file name for display.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// An image split into its MIME type and base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64 payload without the data URL prefix.
    pub base64_data: String,
}

impl EncodedImage {
    /// Creates an encoded image from its parts.
    pub fn new(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64_data: base64_data.into(),
        }
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }

    /// Decodes the base64 payload into raw bytes. Padding is optional.
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        use base64::Engine;

        let data = self.base64_data.as_bytes();
        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
            return Ok(bytes);
        }
        base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(data)
            .map_err(|e| StylizeError::Decode(e.to_string()))
    }

    /// Returns the approximate decoded size in bytes.
    pub fn approx_size(&self) -> usize {
        let unpadded = self.base64_data.trim_end_matches('=').len();
        unpadded * 3 / 4
    }

    /// Returns the format detected from the payload's magic bytes.
    ///
    /// `None` when the payload does not decode or the format is not one we
    /// recognise.
    pub fn detected_format(&self) -> Option<ImageFormat> {
        self.decode_bytes()
            .ok()
            .and_then(|bytes| ImageFormat::from_magic_bytes(&bytes))
    }

    /// Returns the file extension matching the MIME type, if it is a known one.
    pub fn extension(&self) -> Option<&'static str> {
        ImageFormat::from_mime_type(&self.mime_type).map(|f| f.extension())
    }

    /// Decodes the payload and writes it to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.decode_bytes()?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";
    const HEIC_MAGIC: [u8; 12] = *b"\x00\x00\x00\x18ftypheic";
    const HEIF_MAGIC: [u8; 12] = *b"\x00\x00\x00\x18ftypmif1";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(ImageFormat::from_magic_bytes(&PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_magic_bytes(&JPEG_MAGIC), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_magic_bytes(&WEBP_MAGIC), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_magic_bytes(&HEIC_MAGIC), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_magic_bytes(&HEIF_MAGIC), Some(ImageFormat::Heif));
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a\0\0\0\0\0\0"), None);
        assert_eq!(ImageFormat::from_magic_bytes(&[0x89, 0x50]), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(ImageFormat::from_mime_type("image/png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime_type("IMAGE/JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime_type("image/heif"), Some(ImageFormat::Heif));
        assert_eq!(ImageFormat::from_mime_type("image/gif"), None);
        assert_eq!(ImageFormat::from_mime_type(""), None);
    }

    #[test]
    fn test_selected_file_from_path() {
        assert_eq!(SelectedFile::from_path("me.JPG").mime_type, "image/jpeg");
        assert_eq!(SelectedFile::from_path("dir/me.heic").mime_type, "image/heic");
        assert_eq!(
            SelectedFile::from_path("notes.txt").mime_type,
            "application/octet-stream"
        );
        assert_eq!(SelectedFile::from_path("dir/me.webp").display_name(), "me.webp");
    }

    #[test]
    fn test_encoded_image_data_url_and_size() {
        let image = EncodedImage::new("image/png", "AAAAAAAAAAAAAA==");
        assert_eq!(image.to_data_url(), "data:image/png;base64,AAAAAAAAAAAAAA==");
        assert_eq!(image.approx_size(), 10);
        assert_eq!(image.decode_bytes().unwrap(), vec![0u8; 10]);
        assert_eq!(image.extension(), Some("png"));
    }

    #[test]
    fn test_encoded_image_unpadded_payload() {
        let image = EncodedImage::new("image/png", "AAAAAAAAAAAAAA");
        assert_eq!(image.approx_size(), 10);
        assert_eq!(image.decode_bytes().unwrap(), vec![0u8; 10]);
    }

    #[tokio::test]
    async fn test_save_unpadded_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");

        EncodedImage::new("image/png", "AAAAAAAAAAAAAA")
            .save(&path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8; 10]);
    }

    #[test]
    fn test_detected_format() {
        // 12 bytes: PNG signature followed by zeros
        let png = EncodedImage::new("image/jpeg", "iVBORw0KGgoAAAAA");
        assert_eq!(png.detected_format(), Some(ImageFormat::Png));

        let unknown = EncodedImage::new("image/png", "AAAAAAAAAAAAAAAA");
        assert_eq!(unknown.detected_format(), None);
        assert_eq!(EncodedImage::new("image/png", "!!").detected_format(), None);
    }

    #[test]
    fn test_encoded_image_bad_payload() {
        let image = EncodedImage::new("image/png", "not base64!");
        assert!(matches!(image.decode_bytes(), Err(StylizeError::Decode(_))));
    }

    #[test]
    fn test_encoded_image_serializes_camel_case() {
        let json = serde_json::to_value(EncodedImage::new("image/png", "AA==")).unwrap();
        assert_eq!(json["mimeType"], "image/png");
        assert_eq!(json["base64Data"], "AA==");
    }
}
