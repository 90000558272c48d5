//! Error types for portrait stylization.

use std::path::PathBuf;

/// Phrase the Gemini API uses when the key's project or the model cannot be
/// resolved. Seeing it means the credential has to be chosen again.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Longest provider error body carried into a message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while preparing, submitting or finishing a stylization.
#[derive(Debug, thiserror::Error)]
pub enum StylizeError {
    /// The uploaded file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    FileRead {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The upload's MIME type is not on the allow-list.
    #[error("unsupported file type: {0}. Please upload a PNG, JPEG, WEBP, HEIC or HEIF image")]
    UnsupportedType(String),

    /// A data URL did not have the `data:<mime>;base64,<payload>` shape.
    #[error("malformed data URL: {0}")]
    DataUrlFormat(String),

    /// Generation was attempted without its prerequisites.
    #[error("{0}")]
    Validation(String),

    /// The remote service rejected the credential; the user must sign in again.
    #[error("API key is invalid or was not found, please select a key again: {0}")]
    AuthExpired(String),

    /// Any other failure of the remote generation call.
    #[error("generation failed: {0}")]
    Generation(String),

    /// API key missing or rejected by the provider.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The provider answered 2xx but without a usable image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StylizeError {
    /// Folds a failure of the remote generation call into one of the two
    /// user-facing buckets: [`StylizeError::AuthExpired`] or
    /// [`StylizeError::Generation`].
    pub fn classify_remote(self) -> Self {
        match self {
            Self::AuthExpired(_) | Self::Generation(_) => self,
            Self::Auth(msg) => Self::AuthExpired(msg),
            other => {
                let message = other.to_string();
                if message.contains(ENTITY_NOT_FOUND) {
                    Self::AuthExpired(message)
                } else {
                    Self::Generation(message)
                }
            }
        }
    }

    /// Returns true if this error should send the user back through sign-in.
    pub fn resets_access(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }
}

/// Result type alias for stylization operations.
pub type Result<T> = std::result::Result<T, StylizeError>;

/// Trims a provider error body and redacts anything that looks like a key.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted = text
        .split_inclusive(char::is_whitespace)
        .map(|word| {
            let trimmed = word.trim_end();
            if let Some(pos) = trimmed.find("key=") {
                format!("{}key=[REDACTED]{}", &trimmed[..pos], &word[trimmed.len()..])
            } else if trimmed.starts_with("AIza") && trimmed.len() > 20 {
                format!("[REDACTED]{}", &word[trimmed.len()..])
            } else {
                word.to_string()
            }
        })
        .collect::<String>();

    let trimmed = redacted.trim();
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
