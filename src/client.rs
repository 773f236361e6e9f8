use std::future::Future;

use reqwest::RequestBuilder;
use serde_json::Value;

use crate::claude::ClaudeAnalyzer;
use crate::error::AnalyzeError;
use crate::gemini::GeminiAnalyzer;
use crate::parser;
use crate::types::{Analysis, MediaType, Provider, ResponseFormat, VisionConfig};

pub const DEFAULT_JSON_PROMPT: &str = r#"You are analyzing a hand-drawn artwork image.
(Don't worry about blank spaces; they will hold text when this becomes a book.)

Return your analysis as a JSON object with exactly these three keys:
- "short_description": A 1-2 sentence overview of the artwork.
- "long_description": A 4-5 sentence detailed description of the artwork.
- "tags": A comma-separated string of descriptive tags for this image.

Return ONLY the JSON object, no other text."#;

pub const DEFAULT_SECTIONS_PROMPT: &str = "This is a hand-drawn artwork. (Don't worry about spaces, they will be a place for text when it becomes a book.) Please provide: \n1. A short description (1-2 sentences)\n2. A detailed description (4-5 sentences)\n3. A comma-separated list of tags for this image";

/// Something that can turn an image into an [`Analysis`].
///
/// Implemented by the HTTP backends and by test fakes. One call is one
/// attempt; retries are the caller's business (see [`crate::retry`]).
pub trait VisionAnalyzer: Send + Sync {
    fn analyze(
        &self,
        image: &[u8],
        media_type: MediaType,
    ) -> impl Future<Output = Result<Analysis, AnalyzeError>> + Send;
}

/// Provider-selected backend, for callers that pick the API at runtime.
#[derive(Debug, Clone)]
pub enum VisionClient {
    Claude(ClaudeAnalyzer),
    Gemini(GeminiAnalyzer),
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Self {
        match config.provider {
            Provider::Claude => VisionClient::Claude(ClaudeAnalyzer::new(config)),
            Provider::Gemini => VisionClient::Gemini(GeminiAnalyzer::new(config)),
        }
    }

    pub fn config(&self) -> &VisionConfig {
        match self {
            VisionClient::Claude(c) => c.config(),
            VisionClient::Gemini(g) => g.config(),
        }
    }
}

impl VisionAnalyzer for VisionClient {
    async fn analyze(&self, image: &[u8], media_type: MediaType) -> Result<Analysis, AnalyzeError> {
        match self {
            VisionClient::Claude(c) => c.analyze(image, media_type).await,
            VisionClient::Gemini(g) => g.analyze(image, media_type).await,
        }
    }
}

/// The prompt to send: the configured override, else the built-in one for
/// the response format.
pub fn prompt_for(config: &VisionConfig) -> &str {
    match (&config.prompt, config.response_format) {
        (Some(custom), _) => custom.as_str(),
        (None, ResponseFormat::Json) => DEFAULT_JSON_PROMPT,
        (None, ResponseFormat::Sections) => DEFAULT_SECTIONS_PROMPT,
    }
}

pub(crate) fn encode_image(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

pub(crate) fn require_api_key(config: &VisionConfig) -> Result<&str, AnalyzeError> {
    config
        .api_key
        .as_deref()
        .ok_or(AnalyzeError::MissingApiKey(config.provider.api_key_vars()[0]))
}

/// Send a prepared request and decode the JSON envelope.
pub(crate) async fn send_json(request: RequestBuilder, url: &str) -> Result<Value, AnalyzeError> {
    let resp = request
        .send()
        .await
        .map_err(|e| AnalyzeError::Connection(url.to_string(), e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(AnalyzeError::Api { status, body });
    }

    resp.json()
        .await
        .map_err(|e| AnalyzeError::InvalidResponse(e.to_string()))
}

pub(crate) fn parse_reply(text: &str, format: ResponseFormat) -> Result<Analysis, AnalyzeError> {
    parser::parse_response(text, format).map_err(|e| AnalyzeError::Parse(e.to_string()))
}
