use reqwest::Client;
use serde_json::{json, Value};

use crate::client::{self, VisionAnalyzer};
use crate::error::AnalyzeError;
use crate::types::{Analysis, MediaType, VisionConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Vision backend for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeAnalyzer {
    http: Client,
    config: VisionConfig,
}

impl ClaudeAnalyzer {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Build the `/v1/messages` payload: one user turn holding the prompt
    /// and the base64 image.
    pub fn request_body(&self, image_b64: &str, media_type: MediaType) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": client::prompt_for(&self.config) },
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": media_type.as_str(),
                                "data": image_b64,
                            }
                        }
                    ]
                }
            ]
        })
    }
}

impl VisionAnalyzer for ClaudeAnalyzer {
    async fn analyze(&self, image: &[u8], media_type: MediaType) -> Result<Analysis, AnalyzeError> {
        let api_key = client::require_api_key(&self.config)?;
        let body = self.request_body(&client::encode_image(image), media_type);

        let url = format!("{}/v1/messages", self.config.endpoint);
        tracing::debug!(model = %self.config.model, %media_type, "POST {}", url);

        let request = self
            .http
            .post(&url)
            .timeout(self.config.timeout)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let json = client::send_json(request, &url).await?;
        let text = extract_text(&json).ok_or_else(|| {
            AnalyzeError::InvalidResponse("no text block in message content".to_string())
        })?;

        client::parse_reply(&text, self.config.response_format)
    }
}

/// Text of the first `text` content block of a Messages API response.
pub fn extract_text(response: &Value) -> Option<String> {
    response
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .and_then(|block| block.get("text"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let analyzer = ClaudeAnalyzer::new(VisionConfig::default().max_tokens(512));
        let body = analyzer.request_body("AAAA", MediaType::Png);

        assert_eq!(body["model"], "claude-sonnet-4-5-20250929");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.0);

        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], client::DEFAULT_JSON_PROMPT);
        assert_eq!(content[1]["source"]["type"], "base64");
        assert_eq!(content[1]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["source"]["data"], "AAAA");
    }

    #[test]
    fn extract_text_skips_non_text_blocks() {
        let response = json!({
            "content": [
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "{\"tags\": \"a\"}" }
            ]
        });
        assert_eq!(extract_text(&response).as_deref(), Some("{\"tags\": \"a\"}"));
    }

    #[test]
    fn extract_text_missing_content() {
        assert!(extract_text(&json!({ "error": "boom" })).is_none());
        assert!(extract_text(&json!({ "content": [] })).is_none());
    }

    #[tokio::test]
    async fn analyze_without_key_fails_fast() {
        let analyzer = ClaudeAnalyzer::new(VisionConfig::default());
        let err = analyzer.analyze(b"img", MediaType::Jpeg).await.unwrap_err();
        assert!(matches!(err, AnalyzeError::MissingApiKey("ANTHROPIC_API_KEY")));
    }
}
