use indicatif::{ProgressBar, ProgressStyle};

use crate::client::VisionAnalyzer;
use crate::error::{AnnotateError, Result};
use crate::ledger::{self, LedgerWriter};
use crate::rate_limit::RateLimiter;
use crate::retry::{self, analyze_with_retry, Outcome};
use crate::scanner;
use crate::types::{AnnotationRecord, BatchConfig, ImageFile};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Supported images in the directory
    pub found: usize,
    /// Images skipped because the ledger already had them
    pub already_done: usize,
    /// Sentinel rows purged by retry-failed mode
    pub purged: usize,
    /// Rows appended this run (successes and sentinels)
    pub processed: usize,
    /// Rows appended this run that are sentinels
    pub failed: usize,
    /// Images recorded without an orientation
    pub unreadable: usize,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.processed - self.failed
    }
}

/// Sequential, resumable annotation of one directory into one ledger.
pub struct BatchRunner {
    config: BatchConfig,
    limiter: RateLimiter,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        let limiter = RateLimiter::new(config.request_delay);
        Self { config, limiter }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Annotate every image in the directory that the ledger lacks.
    ///
    /// Each image is read, classified, analyzed (with retries), appended to
    /// the ledger and synced before the rate-limit pause and the next image.
    ///
    /// # Errors
    ///
    /// Only directory- and ledger-level failures are returned; per-image
    /// problems become sentinel rows or empty orientations.
    pub async fn run<A: VisionAnalyzer>(&self, analyzer: &A) -> Result<BatchSummary> {
        let config = &self.config;
        let files = scanner::scan_directory(&config.image_dir)?;

        let mut summary = BatchSummary {
            found: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            tracing::warn!("No supported images found in {}", config.image_dir.display());
            return Ok(summary);
        }
        tracing::info!("Found {} images in {}", files.len(), config.image_dir.display());

        if config.retry_failed {
            summary.purged = ledger::purge_failed(&config.output)?;
            if summary.purged > 0 {
                tracing::info!("Purged {} failed rows for retry", summary.purged);
            }
        }

        let completed = ledger::load_completed(&config.output)?;
        let todo = ledger::pending(files, &completed);
        summary.already_done = summary.found - todo.len();

        if summary.already_done > 0 {
            tracing::info!(
                "{} already processed, resuming with {} remaining",
                summary.already_done,
                todo.len()
            );
        }

        if todo.is_empty() {
            tracing::info!("Nothing new to process");
            return Ok(summary);
        }

        let mut writer = LedgerWriter::open(&config.output)?;
        let progress = self.progress_bar(todo.len());

        for file in &todo {
            progress.set_message(file.filename.clone());
            let (record, failed) = self.process_file(analyzer, file).await;

            writer.append(&record)?;
            summary.processed += 1;
            if failed {
                summary.failed += 1;
            }
            if record.orientation.is_none() {
                summary.unreadable += 1;
            }
            progress.inc(1);

            self.limiter.pause().await;
        }

        progress.finish_and_clear();
        tracing::info!(
            "Done: {} analyzed, {} failed; {} total entries in {}",
            summary.succeeded(),
            summary.failed,
            summary.already_done + summary.processed,
            writer.path().display()
        );
        Ok(summary)
    }

    async fn process_file<A: VisionAnalyzer>(
        &self,
        analyzer: &A,
        file: &ImageFile,
    ) -> (AnnotationRecord, bool) {
        tracing::info!("Processing {}", file.filename);

        let orientation = match scanner::read_orientation(&file.path) {
            Ok(o) => Some(o),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        };

        let bytes = match std::fs::read(&file.path) {
            Ok(b) => b,
            Err(e) => {
                let err = AnnotateError::io(&file.path, e);
                tracing::error!("{}", err);
                let record =
                    AnnotationRecord::new(&file.filename, retry::sentinel(&err.to_string()), orientation);
                return (record, true);
            }
        };

        let outcome = analyze_with_retry(
            analyzer,
            &bytes,
            file.media_type,
            &self.config.retry,
            self.config.request_delay,
        )
        .await;

        if let Outcome::Failed { error, .. } = &outcome {
            tracing::error!("Error analyzing {}: {}", file.filename, error);
        }

        let failed = outcome.is_failed();
        let record = AnnotationRecord::new(&file.filename, outcome.into_analysis(), orientation);
        (record, failed)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta}] {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }
}
