//! # artwork-annotator
//!
//! Resumable batch annotation of artwork images with Claude or Gemini
//! vision models.
//!
//! ## Features
//!
//! - **Directory scan** of `.jpg`, `.jpeg`, `.png`, `.gif` and `.webp` files,
//!   sorted by name
//! - **Resume**: files already in the CSV ledger are skipped, so an
//!   interrupted run picks up where it stopped
//! - **Crash-safe ledger**: every row is flushed and synced before the next
//!   image is touched
//! - **Retry with backoff** for malformed replies, rate limits and server
//!   errors; terminal failures are recorded as sentinel rows
//! - **Retry-failed mode** that purges sentinel rows so those images run again
//! - **Orientation** (landscape/portrait) read from the image header
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use artwork_annotator::{BatchConfig, BatchRunner, VisionClient, VisionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VisionClient::new(VisionConfig::default().with_env_overrides());
//!     let runner = BatchRunner::new(BatchConfig::new("kapok_tree_images", "descriptions.csv"));
//!
//!     let summary = runner.run(&client).await?;
//!     println!("{} analyzed, {} failed", summary.succeeded(), summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without the network
//!
//! [`BatchRunner::run`] accepts any [`VisionAnalyzer`], so tests can plug in
//! a scripted fake and a zero [`BatchConfig::request_delay`].
//!
//! ```rust
//! use artwork_annotator::{parse_json, strip_code_fence};
//!
//! let reply = "```json\n{\"short_description\": \"A tree.\", \"tags\": \"tree\"}\n```";
//! assert_eq!(strip_code_fence(reply), "{\"short_description\": \"A tree.\", \"tags\": \"tree\"}");
//! assert_eq!(parse_json(reply).unwrap().tags, "tree");
//! ```

pub mod claude;
pub mod client;
pub mod error;
pub mod forecast;
pub mod gemini;
pub mod ledger;
pub mod parser;
pub mod rate_limit;
pub mod retry;
pub mod runner;
pub mod scanner;
pub mod types;

// Re-export main types at crate root
pub use claude::ClaudeAnalyzer;
pub use client::{VisionAnalyzer, VisionClient};
pub use error::{AnalyzeError, AnnotateError, RetryClass, Result};
pub use gemini::GeminiAnalyzer;
pub use ledger::LedgerWriter;
pub use parser::{parse_json, parse_response, parse_sections, strip_code_fence, ParseError};
pub use rate_limit::RateLimiter;
pub use retry::{analyze_with_retry, Outcome, RetryPolicy};
pub use runner::{BatchRunner, BatchSummary};
pub use scanner::{read_orientation, scan_directory};
pub use types::{
    Analysis, AnnotationRecord, BatchConfig, ImageFile, MediaType, Orientation, Provider,
    ResponseFormat, VisionConfig,
};
