#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Runs a scrape for one source: resolve its rule, load and validate its
//! configuration, then hand the pages to the [`ScrapeDriver`].

pub mod driver;
pub mod invocation;

use std::time::Instant;

use api_scraper_config_store::{ConfigStore, ConfigStoreError};
use api_scraper_fetcher::{FetchError, PageFetcher};
use api_scraper_source::{
    ApiMapping, ResolveError, TimestampError, TransformError, ValidationError, validate_and_parse,
};
use api_scraper_storage::{BatchWriteBackend, BatchWriter, WriteError};

pub use driver::{PageFailure, ScrapeDriver, ScrapeSummary};
pub use invocation::{Invocation, InvocationError};

/// Anything that can stop a scrape run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The source or its group is not registered.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The source's configuration blob was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The configuration blob could not be loaded.
    #[error(transparent)]
    ConfigStore(#[from] ConfigStoreError),

    /// A page request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A page could not be shaped into records.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The page timestamp could not be produced.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    /// A batch could not be written.
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl IngestError {
    /// Whether this is the "page held no records" outcome, which callers
    /// treat as nothing to do rather than a failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transform(e) if e.is_empty_record_set())
    }
}

/// Scrapes the source named by `invocation` end to end.
///
/// Configuration problems (unknown source, missing or invalid config) fail
/// before any page is requested.
///
/// # Errors
///
/// Returns [`IngestError`] for configuration problems, or for page failures
/// the source's rule does not tolerate.
pub async fn execute<F: PageFetcher, B: BatchWriteBackend>(
    mapping: &ApiMapping,
    store: &dyn ConfigStore,
    fetcher: &F,
    writer: &BatchWriter<B>,
    invocation: &Invocation,
) -> Result<ScrapeSummary, IngestError> {
    let start = Instant::now();
    let source_name = invocation.source_api_name.as_str();
    log::info!("[{source_name}] Starting run for app '{}'", invocation.app);

    let resolved = mapping.resolve(source_name)?;
    log::debug!(
        "[{source_name}] group '{}', {} rule",
        resolved.group,
        resolved.rule.kind
    );

    let blob = store.fetch_config(&invocation.app, source_name).await?;
    let config = validate_and_parse(source_name, blob)?;

    let summary = ScrapeDriver::new(&config, fetcher, writer)
        .run(resolved.rule)
        .await?;

    log::info!(
        "[{source_name}] Finished in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(summary)
}
