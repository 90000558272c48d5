#![warn(missing_docs)]
//! Stylize - restyle portrait photos with a text prompt.
//!
//! Upload a photo, pick a style from the catalog (or write your own prompt),
//! and send both to a generative image API. The [`Studio`] controller keeps
//! the state in between: the upload, the working prompt, the single
//! in-flight request, the last result and the access gate.
//!
//! # Quick Start
//!
//! ```no_run
//! use stylize::{GeminiProvider, SelectedFile, Studio, StudioOptions};
//!
//! #[tokio::main]
//! async fn main() -> stylize::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let mut studio = Studio::new(None, StudioOptions::default());
//!     studio.start().await;
//!
//!     studio.upload(&SelectedFile::from_path("me.jpg")).await?;
//!     studio.select_style("watercolor")?;
//!     studio.generate(&provider).await?;
//!
//!     if let Some(image) = studio.state().generated() {
//!         image.save("me-watercolor.png").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Data URLs
//!
//! ```
//! let image = stylize::decode_data_url("data:image/png;base64,AAAAAAAAAAAAAA==")?;
//! assert_eq!(image.mime_type, "image/png");
//! assert_eq!(image.base64_data, "AAAAAAAAAAAAAA==");
//! # Ok::<(), stylize::StylizeError>(())
//! ```
//!
//! # Features
//!
//! - `gemini`: Gemini (Google) image editing provider
//! - `cli`: Command-line interface

pub mod credentials;
mod error;
pub mod gate;
pub mod image;
pub mod styles;
pub mod studio;

// Re-export error types at crate root
pub use error::{Result, StylizeError, ENTITY_NOT_FOUND};

pub use credentials::{ApiKeyAuthority, CredentialAuthority, KeyPrompt, SharedApiKey};
pub use gate::{AccessGate, GateState, SignInPolicy};
pub use image::{
    check_upload_type, decode_data_url, encode_bytes_as_data_url, encode_file_as_data_url,
    EncodedImage, GenerationService, ImageFormat, SelectedFile,
};
pub use studio::{AppState, Completion, GenerationPhase, GenerationTicket, Studio, StudioOptions};
pub use styles::StyleEntry;

#[cfg(feature = "gemini")]
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, StylizeError};
    pub use crate::image::{EncodedImage, GenerationService, SelectedFile};
    pub use crate::studio::{Studio, StudioOptions};

    #[cfg(feature = "gemini")]
    pub use crate::image::providers::GeminiProvider;
}
