use reqwest::Client;
use serde_json::{json, Value};

use crate::client::{self, VisionAnalyzer};
use crate::error::AnalyzeError;
use crate::types::{Analysis, MediaType, VisionConfig};

/// Vision backend for the Gemini `generateContent` REST API.
#[derive(Debug, Clone)]
pub struct GeminiAnalyzer {
    http: Client,
    config: VisionConfig,
}

impl GeminiAnalyzer {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn request_body(&self, image_b64: &str, media_type: MediaType) -> Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        { "text": client::prompt_for(&self.config) },
                        {
                            "inline_data": {
                                "mime_type": media_type.as_str(),
                                "data": image_b64,
                            }
                        }
                    ]
                }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            }
        })
    }
}

impl VisionAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, image: &[u8], media_type: MediaType) -> Result<Analysis, AnalyzeError> {
        let api_key = client::require_api_key(&self.config)?;
        let body = self.request_body(&client::encode_image(image), media_type);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint, self.config.model
        );
        tracing::debug!(model = %self.config.model, %media_type, "POST {}", url);

        let request = self
            .http
            .post(&url)
            .timeout(self.config.timeout)
            .header("x-goog-api-key", api_key)
            .json(&body);

        let json = client::send_json(request, &url).await?;
        let text = extract_text(&json).ok_or_else(|| {
            AnalyzeError::InvalidResponse("no text parts in first candidate".to_string())
        })?;

        client::parse_reply(&text, self.config.response_format)
    }
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
