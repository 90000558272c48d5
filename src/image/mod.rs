//! Image payloads, their encoding, and the services that restyle them.

pub mod encoding;
mod provider;
pub mod providers;
mod types;

pub use encoding::{
    check_upload_type, decode_data_url, encode_bytes_as_data_url, encode_file_as_data_url,
    encode_upload,
};
pub use provider::GenerationService;
pub use types::{EncodedImage, ImageFormat, SelectedFile};
