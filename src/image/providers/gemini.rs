//! Gemini (Google) image editing provider.

use crate::credentials::SharedApiKey;
use crate::error::{sanitize_error_message, Result, StylizeError};
use crate::image::provider::GenerationService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = StylizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nano-banana" | "flash" | "gemini-2.5-flash-image" => Ok(Self::NanoBanana),
            "nano-banana-pro" | "pro" | "nano-banana-pro-preview" => Ok(Self::NanoBananaPro),
            other => Err(StylizeError::Validation(format!("unknown Gemini model: {other}"))),
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<SharedApiKey>,
    model: GeminiModel,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SharedApiKey::with_key(key));
        self
    }

    /// Reads the key from a shared slot on every request. The slot may be
    /// empty at build time and filled later by sign-in.
    pub fn shared_key(mut self, key: SharedApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets a whole-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the provider.
    ///
    /// Without an explicit key or slot, the key is read from `GEMINI_API_KEY`
    /// or `GOOGLE_API_KEY` and building fails if neither is set.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = match self.api_key {
            Some(key) => key,
            None => {
                let key = SharedApiKey::from_env();
                if !key.is_present() {
                    return Err(StylizeError::Auth(
                        "GEMINI_API_KEY / GOOGLE_API_KEY not set and no API key provided".into(),
                    ));
                }
                key
            }
        };

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(GeminiProvider {
            client: client.build()?,
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Gemini image editing provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SharedApiKey,
    model: GeminiModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    fn current_key(&self) -> Result<String> {
        self.api_key
            .get()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StylizeError::Auth("no API key; sign in first".into()))
    }

    async fn generate_impl(&self, image_base64: &str, mime_type: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let api_key = self.current_key()?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model.as_str());
        let body = GeminiRequest::edit(image_base64, mime_type, prompt);

        tracing::debug!(model = %self.model.as_str(), mime_type, "submitted Gemini edit request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let image = extract_image(gemini_response)?;

        tracing::debug!(
            model = %self.model.as_str(),
            mime_type = %image.mime_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini edit complete"
        );

        Ok(format!("data:{};base64,{}", image.mime_type, image.data))
    }
}

/// Pulls the first inline image out of a 200 response, turning blocks and
/// empty answers into errors.
fn extract_image(response: GeminiResponse) -> Result<InlineData> {
    // Blocks on the prompt come back as HTTP 200
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(StylizeError::ContentBlocked(msg));
        }
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        StylizeError::UnexpectedResponse("No candidates in Gemini response".into())
    })?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST" => {
                return Err(StylizeError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
            "IMAGE_OTHER" | "NO_IMAGE" => {
                return Err(StylizeError::UnexpectedResponse(format!(
                    "Generation failed: {}. Try a different prompt.",
                    finish_reason
                )));
            }
            _ => {}
        }
    }

    let content = candidate.content.ok_or_else(|| {
        StylizeError::UnexpectedResponse("No content in Gemini candidate".into())
    })?;

    let mut text_parts = Vec::new();
    for part in content.parts {
        if let Some(inline) = part.inline_data {
            return Ok(inline);
        }
        if let Some(text) = part.text {
            text_parts.push(text);
        }
    }

    // The model sometimes answers with prose instead of an image
    let detail = if text_parts.is_empty() {
        "No image data in Gemini response".to_string()
    } else {
        format!(
            "No image data in Gemini response; model said: {}",
            sanitize_error_message(&text_parts.join(" "))
        )
    };
    Err(StylizeError::UnexpectedResponse(detail))
}

fn parse_error(status: u16, text: &str) -> StylizeError {
    // Prefer the structured message; fall back to the raw body
    let message = serde_json::from_str::<GeminiErrorEnvelope>(text)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| text.to_string());
    let message = sanitize_error_message(&message);

    if status == 401 || status == 403 {
        return StylizeError::Auth(message);
    }
    let lower = message.to_lowercase();
    if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
        return StylizeError::Auth(message);
    }
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return StylizeError::ContentBlocked(message);
    }
    StylizeError::Api { status, message }
}

#[async_trait]
impl GenerationService for GeminiProvider {
    async fn generate(&self, image_base64: &str, mime_type: &str, prompt: &str) -> Result<String> {
        self.generate_impl(image_base64, mime_type, prompt).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let api_key = self.current_key()?;
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &api_key)
            .send()
            .await?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(parse_error(status, &text))
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn edit(image_base64: &str, mime_type: &str, prompt: &str) -> Self {
        // Image first, then the instruction
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.to_string(),
                    data: image_base64.to_string(),
                },
            },
            GeminiRequestPart::Text {
                text: prompt.to_string(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ENTITY_NOT_FOUND;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the base URL plus a handle
    /// resolving to the raw request that was received.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn provider(base_url: &str) -> GeminiProvider {
        GeminiProvider::builder()
            .api_key("test-key")
            .base_url(base_url)
            .build()
            .unwrap()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(GeminiModel::NanoBananaPro.as_str(), "nano-banana-pro-preview");
        assert_eq!(GeminiModel::default(), GeminiModel::NanoBanana);
    }

    #[test]
    fn test_gemini_model_from_str() {
        assert_eq!("pro".parse::<GeminiModel>().unwrap(), GeminiModel::NanoBananaPro);
        assert_eq!("nano-banana".parse::<GeminiModel>().unwrap(), GeminiModel::NanoBanana);
        assert!("imagen".parse::<GeminiModel>().is_err());
    }

    #[test]
    fn test_builder_with_shared_empty_key() {
        let provider = GeminiProvider::builder().shared_key(SharedApiKey::new()).build();
        assert!(provider.is_ok());
        assert!(matches!(
            provider.unwrap().current_key(),
            Err(StylizeError::Auth(_))
        ));
    }

    #[test]
    fn test_request_puts_image_before_prompt() {
        let req = GeminiRequest::edit("AAAA", "image/jpeg", "Make it a watercolor");
        let json = serde_json::to_value(&req).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inline_data"]["data"], "AAAA");
        assert_eq!(parts[1]["text"], "Make it a watercolor");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_extract_image() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your portrait"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let inline = extract_image(resp).unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "iVBORw0KGgo=");
    }

    #[test]
    fn test_extract_image_text_only() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "I can't do that"}]}}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        match extract_image(resp) {
            Err(StylizeError::UnexpectedResponse(msg)) => assert!(msg.contains("I can't do that")),
            other => panic!("expected UnexpectedResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_image_prompt_blocked() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        match extract_image(resp) {
            Err(StylizeError::ContentBlocked(msg)) => assert_eq!(msg, "Prompt blocked: SAFETY"),
            other => panic!("expected ContentBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_image_safety_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(extract_image(resp), Err(StylizeError::ContentBlocked(_))));
    }

    #[test]
    fn test_parse_error_uses_structured_message() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        match parse_error(404, body) {
            StylizeError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Requested entity was not found.");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_auth() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}}"#;
        assert!(matches!(parse_error(400, body), StylizeError::Auth(_)));
        assert!(matches!(parse_error(403, "forbidden"), StylizeError::Auth(_)));
        assert!(matches!(parse_error(500, "oops"), StylizeError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_generate_returns_data_url() {
        let body = r#"{"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}]}, "finishReason": "STOP"}]}"#;
        let (base_url, server) = serve_once("200 OK", body).await;

        let url = provider(&base_url)
            .generate("AAAA", "image/jpeg", "Make it pop art")
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw0KGgo=");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /models/gemini-2.5-flash-image:generateContent"));
        assert!(request.to_lowercase().contains("x-goog-api-key: test-key"));
        assert!(request.contains("Make it pop art"));
    }

    #[tokio::test]
    async fn test_generate_entity_not_found_classifies_as_auth_expired() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        let (base_url, server) = serve_once("404 Not Found", body).await;

        let err = provider(&base_url)
            .generate("AAAA", "image/png", "prompt")
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(err.to_string().contains(ENTITY_NOT_FOUND));
        assert!(err.classify_remote().resets_access());
    }

    #[tokio::test]
    async fn test_generate_without_key_makes_no_request() {
        let provider = GeminiProvider::builder()
            .shared_key(SharedApiKey::new())
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        assert!(matches!(
            provider.generate("AAAA", "image/png", "prompt").await,
            Err(StylizeError::Auth(_))
        ));
    }
}
