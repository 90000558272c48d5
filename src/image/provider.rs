//! Generation service trait.

use crate::error::Result;
use async_trait::async_trait;

/// A remote service that restyles an image according to a text prompt.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Sends the base64 image and prompt, resolving to the generated image as
    /// a data URL.
    async fn generate(&self, image_base64: &str, mime_type: &str, prompt: &str) -> Result<String>;

    /// Returns the name of this service for display.
    fn name(&self) -> &str;

    /// Checks if the service is reachable and the credential is accepted.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
