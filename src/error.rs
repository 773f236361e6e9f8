use std::path::PathBuf;
use thiserror::Error;

/// HTTP statuses worth retrying: rate limiting and transient server errors.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 529];

/// Errors that abort a batch run or a ledger operation.
#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Cannot decode image {}: {reason}", path.display())]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to replace ledger {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}

impl AnnotateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnnotateError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Errors returned by a vision backend for a single image.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// The API answered with a non-success HTTP status.
    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Cannot connect to {0}: {1}")]
    Connection(String, String),

    /// The API answered, but the envelope was not what we expected.
    #[error("Invalid response from API: {0}")]
    InvalidResponse(String),

    /// The model's text could not be decoded into the three fields.
    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("Failed to read image: {0}")]
    ImageRead(String),
}

/// How the retry loop treats an [`AnalyzeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Malformed model output: retry on the parse backoff schedule.
    Parse,
    /// Rate limit or server error: retry on the request-delay schedule.
    RateLimited,
    /// Give up immediately.
    Fatal,
}

impl AnalyzeError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            AnalyzeError::Parse(_) => RetryClass::Parse,
            AnalyzeError::Api { status, .. } if RETRYABLE_STATUSES.contains(status) => {
                RetryClass::RateLimited
            }
            _ => RetryClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_class() != RetryClass::Fatal
    }
}
