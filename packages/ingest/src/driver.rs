//! Page-by-page scrape loop.
//!
//! [`ScrapeDriver::run`] derives the page targets for a rule, then for each
//! one fetches the page, settles its shape, transforms the records and
//! writes them. Pages are handled strictly one after another.
//!
//! Failure policy:
//!
//! - An empty page is "nothing to do" under either rule and is logged at
//!   `info`.
//! - Under the default rule any other error aborts the run.
//! - Under the alphabetical rule every letter is attempted; a failing letter
//!   is logged (`warn` for fetch failures, `error` otherwise), recorded in
//!   the [`ScrapeSummary`], and the loop moves on.

use api_scraper_fetcher::PageFetcher;
use api_scraper_source::{RecordTransformer, Timestamp, resolve_response};
use api_scraper_source_models::{PageTarget, RuleType, ScrapingRule, SourceConfig};
use api_scraper_storage::{BatchWriteBackend, BatchWriter, WriteStats};

use crate::IngestError;

/// A page that failed under the alphabetical rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// The page that failed.
    pub target: PageTarget,
    /// Rendered error.
    pub error: String,
}

/// Totals for one [`ScrapeDriver::run`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    /// Pages fetched or attempted.
    pub pages_attempted: usize,
    /// Pages whose records were written.
    pub pages_written: usize,
    /// Pages that held no records.
    pub empty_pages: usize,
    /// Pages that failed and were skipped.
    pub failed: Vec<PageFailure>,
    /// Records written across all pages.
    pub records_written: usize,
    /// Batches written across all pages.
    pub batches_written: usize,
}

impl ScrapeSummary {
    /// Letters of the pages that failed, in the order they were attempted.
    #[must_use]
    pub fn failed_letters(&self) -> Vec<char> {
        self.failed.iter().filter_map(|f| f.target.letter).collect()
    }

    /// Whether every attempted page was either written or empty.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record_written(&mut self, stats: WriteStats) {
        self.pages_written += 1;
        self.records_written += stats.records;
        self.batches_written += stats.batches;
    }
}

impl std::fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pages attempted, {} written, {} empty, {} failed; {} records in {} batches",
            self.pages_attempted,
            self.pages_written,
            self.empty_pages,
            self.failed.len(),
            self.records_written,
            self.batches_written,
        )
    }
}

/// Runs the fetch/transform/write loop for one validated source.
pub struct ScrapeDriver<'a, F, B> {
    config: &'a SourceConfig,
    fetcher: &'a F,
    writer: &'a BatchWriter<B>,
}

impl<'a, F: PageFetcher, B: BatchWriteBackend> ScrapeDriver<'a, F, B> {
    #[must_use]
    pub const fn new(config: &'a SourceConfig, fetcher: &'a F, writer: &'a BatchWriter<B>) -> Self {
        Self {
            config,
            fetcher,
            writer,
        }
    }

    /// Scrapes every page `rule` derives from the configured endpoint.
    ///
    /// # Errors
    ///
    /// Under the default rule, returns the first non-empty page failure.
    /// Under the alphabetical rule, per-page failures are collected into the
    /// summary and this returns `Ok`.
    pub async fn run(&self, rule: &ScrapingRule) -> Result<ScrapeSummary, IngestError> {
        let label = self.config.source_name.as_str();
        let targets = rule.page_targets(&self.config.endpoint);
        let isolate_pages = rule.kind == RuleType::Alphabetical;
        let mut summary = ScrapeSummary::default();

        log::info!(
            "[{label}] Scraping {} page(s) with the {} rule",
            targets.len(),
            rule.kind
        );

        for target in targets {
            summary.pages_attempted += 1;

            match self.process_page(&target).await {
                Ok(stats) => {
                    log::info!("[{label}] {target}: wrote {stats}");
                    summary.record_written(stats);
                }
                Err(e) if e.is_recoverable() => {
                    log::info!("[{label}] {target}: no records");
                    summary.empty_pages += 1;
                }
                Err(e) if !isolate_pages => return Err(e),
                Err(e) => {
                    if matches!(e, IngestError::Fetch(_)) {
                        log::warn!("[{label}] {target}: {e}");
                    } else {
                        log::error!("[{label}] {target}: {e}");
                    }
                    summary.failed.push(PageFailure {
                        target,
                        error: e.to_string(),
                    });
                }
            }
        }

        if summary.is_clean() {
            log::info!("[{label}] Done: {summary}");
        } else {
            log::warn!(
                "[{label}] Done with failures ({:?}): {summary}",
                summary.failed_letters()
            );
        }

        Ok(summary)
    }

    /// Fetches, transforms and writes a single page.
    ///
    /// # Errors
    ///
    /// Returns whichever stage failed first.
    pub async fn process_page(&self, target: &PageTarget) -> Result<WriteStats, IngestError> {
        log::debug!(
            "[{}] {target}: GET {}",
            self.config.source_name,
            target.endpoint
        );

        let body = self
            .fetcher
            .fetch_page(&target.endpoint, &self.config.auth_headers)
            .await?;
        let response = resolve_response(body, &self.config.records_key)?;

        let transformer = RecordTransformer::new(self.config, Timestamp::now()?);
        let records = transformer.transform(response.into_records())?;

        Ok(self
            .writer
            .write_all(&self.config.table_config, &records)
            .await?)
    }
}
