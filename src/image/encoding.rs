//! Data URL encoding of uploads and decoding into [`EncodedImage`].

use crate::error::{Result, StylizeError};
use crate::image::types::{EncodedImage, ImageFormat, SelectedFile};
use base64::Engine;

/// Checks an upload's MIME type against the allow-list.
pub fn check_upload_type(mime_type: &str) -> Result<ImageFormat> {
    ImageFormat::from_mime_type(mime_type)
        .ok_or_else(|| StylizeError::UnsupportedType(display_mime(mime_type)))
}

fn display_mime(mime_type: &str) -> String {
    if mime_type.trim().is_empty() {
        "unknown".to_string()
    } else {
        mime_type.to_string()
    }
}

/// Builds `data:<mime>;base64,<payload>` from raw bytes.
pub fn encode_bytes_as_data_url(mime_type: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// Reads the selected file and returns it as a data URL.
///
/// The MIME type in the URL is the one the picker reported; no sniffing
/// happens here.
pub async fn encode_file_as_data_url(file: &SelectedFile) -> Result<String> {
    let data = tokio::fs::read(&file.path)
        .await
        .map_err(|source| StylizeError::FileRead {
            path: file.path.clone(),
            source,
        })?;

    tracing::debug!(
        file = %file.display_name(),
        mime_type = %file.mime_type,
        size_bytes = data.len(),
        "encoded upload"
    );

    Ok(encode_bytes_as_data_url(&file.mime_type, &data))
}

/// Splits a data URL into its MIME type and base64 payload.
///
/// The string must hold exactly one comma. The part before it must look like
/// `<scheme>:<mime>;...` with a non-empty MIME type. The payload is returned
/// verbatim.
pub fn decode_data_url(data_url: &str) -> Result<EncodedImage> {
    let mut segments = data_url.split(',');
    let (metadata, payload) = match (segments.next(), segments.next(), segments.next()) {
        (Some(metadata), Some(payload), None) => (metadata, payload),
        _ => {
            let commas = data_url.matches(',').count();
            return Err(StylizeError::DataUrlFormat(format!(
                "expected exactly one comma, found {commas}"
            )));
        }
    };

    if metadata.is_empty() {
        return Err(StylizeError::DataUrlFormat("empty metadata segment".into()));
    }

    let (_, after_scheme) = metadata
        .split_once(':')
        .ok_or_else(|| StylizeError::DataUrlFormat("metadata has no scheme".into()))?;
    let (mime_type, _) = after_scheme
        .split_once(';')
        .ok_or_else(|| StylizeError::DataUrlFormat("metadata has no ';' after MIME type".into()))?;

    if mime_type.is_empty() {
        return Err(StylizeError::DataUrlFormat("empty MIME type".into()));
    }

    Ok(EncodedImage::new(mime_type, payload))
}

/// Validates the upload type, reads the file and splits the resulting data URL.
///
/// Files outside the allow-list are rejected before they are read.
pub async fn encode_upload(file: &SelectedFile) -> Result<EncodedImage> {
    check_upload_type(&file.mime_type)?;
    let data_url = encode_file_as_data_url(file).await?;
    decode_data_url(&data_url)
}
