//! Retry with exponential backoff around a single [`VisionAnalyzer`] call,
//! degrading to a sentinel record when the image cannot be analyzed.

use std::time::Duration;

use crate::client::VisionAnalyzer;
use crate::error::{AnalyzeError, RetryClass};
use crate::types::{Analysis, AnnotationRecord, MediaType};

pub const SENTINEL_SHORT_DESCRIPTION: &str = "Error analyzing image";
pub const SENTINEL_TAGS: &str = "error, failed_analysis";
/// Longest error detail copied into a sentinel record, in characters.
pub const MAX_ERROR_DETAIL: usize = 200;

/// Attempt ceiling and backoff bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per image, including the first (default: 3)
    pub max_attempts: u32,
    /// Parse failures wait `parse_backoff_base * 2^attempt` (default: 1s)
    pub parse_backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            parse_backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_parse_backoff_base(mut self, base: Duration) -> Self {
        self.parse_backoff_base = base;
        self
    }

    /// Wait before the attempt after `attempt` (1-based), or `None` if the
    /// error is fatal. Rate-limit backoff is scaled by `request_delay`.
    pub fn backoff(&self, class: RetryClass, attempt: u32, request_delay: Duration) -> Option<Duration> {
        let factor = 2u32.saturating_pow(attempt);
        match class {
            RetryClass::Parse => Some(self.parse_backoff_base.saturating_mul(factor)),
            RetryClass::RateLimited => Some(request_delay.saturating_mul(factor)),
            RetryClass::Fatal => None,
        }
    }
}

/// Result of [`analyze_with_retry`]: either a real analysis or a sentinel.
#[derive(Debug)]
pub enum Outcome {
    Analyzed(Analysis),
    Failed { sentinel: Analysis, error: AnalyzeError },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn into_analysis(self) -> Analysis {
        match self {
            Outcome::Analyzed(a) => a,
            Outcome::Failed { sentinel, .. } => sentinel,
        }
    }
}

/// Analyze one image, retrying parse failures and retryable API errors.
///
/// Fatal errors stop immediately. When attempts run out, or on a fatal
/// error, the returned outcome carries a [`sentinel`] analysis. Never waits
/// after the last attempt.
pub async fn analyze_with_retry<A: VisionAnalyzer>(
    analyzer: &A,
    image: &[u8],
    media_type: MediaType,
    policy: &RetryPolicy,
    request_delay: Duration,
) -> Outcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match analyzer.analyze(image, media_type).await {
            Ok(analysis) => return Outcome::Analyzed(analysis),
            Err(e) => e,
        };

        let class = error.retry_class();
        let wait = policy.backoff(class, attempt, request_delay);

        match wait {
            Some(wait) if attempt < max_attempts => {
                let detail = error.to_string();
                tracing::warn!(
                    "Retryable error on attempt {}/{}, waiting {:?}: {}",
                    attempt,
                    max_attempts,
                    wait,
                    truncate_detail(&detail, 100)
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            _ => {
                if class == RetryClass::Fatal {
                    tracing::error!("Non-retryable error: {}", error);
                } else {
                    tracing::error!("Giving up after {} attempts: {}", attempt, error);
                }
                return Outcome::Failed {
                    sentinel: sentinel(&error.to_string()),
                    error,
                };
            }
        }
    }
}

/// The placeholder analysis recorded for an image that could not be analyzed.
pub fn sentinel(detail: &str) -> Analysis {
    Analysis {
        short_description: SENTINEL_SHORT_DESCRIPTION.to_string(),
        long_description: format!("API error: {}", truncate_detail(detail, MAX_ERROR_DETAIL)),
        tags: SENTINEL_TAGS.to_string(),
    }
}

/// Whether a ledger row was written by a terminal failure.
pub fn is_sentinel(record: &AnnotationRecord) -> bool {
    record.short_description == SENTINEL_SHORT_DESCRIPTION && record.tags == SENTINEL_TAGS
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_detail(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
