use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Which vision API to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Claude,
    Gemini,
}

impl Provider {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Provider::Claude => "https://api.anthropic.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Claude => "claude-sonnet-4-5-20250929",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }

    /// Environment variables consulted for the API key, in priority order.
    pub fn api_key_vars(self) -> &'static [&'static str] {
        match self {
            Provider::Claude => &["ANTHROPIC_API_KEY"],
            Provider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider '{}' (expected claude or gemini)", other)),
        }
    }
}

/// Shape the model is asked to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// A single JSON object with the three fields.
    #[default]
    Json,
    /// Numbered / labeled text sections (legacy prompt).
    Sections,
}

impl std::str::FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "sections" | "text" => Ok(ResponseFormat::Sections),
            other => Err(format!("unknown response format '{}' (expected json or sections)", other)),
        }
    }
}

/// Configuration for the vision client.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub provider: Provider,
    /// API base URL (e.g., "https://api.anthropic.com")
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Token budget for the reply (default: 1024)
    pub max_tokens: u32,
    /// Sampling temperature (default: 0.0 for consistent descriptions)
    pub temperature: f32,
    /// Request timeout (default: 120s)
    pub timeout: Duration,
    /// Custom prompt (overrides the built-in one for the response format)
    pub prompt: Option<String>,
    pub response_format: ResponseFormat,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

impl VisionConfig {
    /// Defaults for the given provider, without reading the environment.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            endpoint: provider.default_endpoint().to_string(),
            model: provider.default_model().to_string(),
            api_key: None,
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            prompt: None,
            response_format: ResponseFormat::Json,
        }
    }

    /// Fill `api_key` from the provider's environment variables if unset.
    pub fn with_env_overrides(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = self
                .provider
                .api_key_vars()
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub image_dir: PathBuf,
    /// CSV ledger path
    pub output: PathBuf,
    /// Pause after every API call (default: 1s)
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    /// Purge failed rows from the ledger before resuming
    pub retry_failed: bool,
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("kapok_tree_images"),
            output: PathBuf::from("artwork_descriptions_claude.csv"),
            request_delay: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            retry_failed: false,
            show_progress: true,
        }
    }
}

impl BatchConfig {
    pub fn new(image_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Set the inter-request delay. Also scales rate-limit backoff.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_failed(mut self, enabled: bool) -> Self {
        self.retry_failed = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }
}

/// Media type of a supported image, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl MediaType {
    /// Map a file extension (without the dot, any case) to a media type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supported image discovered by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Bare file name; the ledger key.
    pub filename: String,
    pub path: PathBuf,
    pub media_type: MediaType,
}

/// Landscape/portrait classification from pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Wider than tall is landscape; everything else, squares included, is portrait.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// The three fields produced by a vision backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    /// Comma-separated tag list
    #[serde(default)]
    pub tags: String,
}

/// One row of the CSV ledger. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub filename: String,
    pub short_description: String,
    pub long_description: String,
    pub tags: String,
    /// Empty when the image could not be decoded.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub orientation: Option<Orientation>,
}

impl AnnotationRecord {
    pub fn new(filename: impl Into<String>, analysis: Analysis, orientation: Option<Orientation>) -> Self {
        Self {
            filename: filename.into(),
            short_description: analysis.short_description,
            long_description: analysis.long_description,
            tags: analysis.tags,
            orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(800, 600), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(600, 800), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(500, 500), Orientation::Portrait);
    }

    #[test]
    fn media_type_from_extension_ignores_case() {
        assert_eq!(MediaType::from_extension("JPG"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_extension("jpeg"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_extension("Png"), Some(MediaType::Png));
        assert_eq!(MediaType::from_extension("gif"), Some(MediaType::Gif));
        assert_eq!(MediaType::from_extension("WEBP"), Some(MediaType::Webp));
        assert_eq!(MediaType::from_extension("tiff"), None);
        assert_eq!(MediaType::Webp.as_str(), "image/webp");
    }

    #[test]
    fn provider_and_format_from_str() {
        assert_eq!("Anthropic".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert!("openai".parse::<Provider>().is_err());
        assert_eq!("sections".parse::<ResponseFormat>().unwrap(), ResponseFormat::Sections);
        assert_eq!("JSON".parse::<ResponseFormat>().unwrap(), ResponseFormat::Json);
    }

    #[test]
    fn vision_config_defaults() {
        let config = VisionConfig::default();
        assert_eq!(config.provider, Provider::Claude);
        assert_eq!(config.model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.response_format, ResponseFormat::Json);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn vision_config_builder() {
        let config = VisionConfig::for_provider(Provider::Gemini)
            .model("gemini-2.0-flash")
            .endpoint("http://localhost:8080/")
            .api_key("k")
            .temperature(0.7)
            .max_tokens(400);
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 400);
    }

    #[test]
    fn explicit_api_key_survives_env_overrides() {
        let config = VisionConfig::default().api_key("explicit").with_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn batch_config_builder() {
        let config = BatchConfig::new("imgs", "out.csv")
            .with_request_delay(Duration::ZERO)
            .with_retry_failed(true)
            .with_progress(false);
        assert_eq!(config.image_dir, PathBuf::from("imgs"));
        assert_eq!(config.output, PathBuf::from("out.csv"));
        assert_eq!(config.request_delay, Duration::ZERO);
        assert!(config.retry_failed);
        assert!(!config.show_progress);
    }
}
