#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batched delete-then-put record storage.
//!
//! [`BatchWriter`] splits a page of [`NormalizedRecord`]s into batches of at
//! most [`MAX_BATCH_SIZE`] and, for each batch, issues one delete call keyed
//! by the table's hash key followed by one put call with the full items.
//! Deleting first clears attributes a previous write set but the new item
//! no longer carries (e.g. a shorter `ingredients` list), so the end state
//! of a page write is the same however many times it is repeated.
//!
//! The storage API itself sits behind [`BatchWriteBackend`];
//! [`dynamodb::DynamoDbBackend`] is the production implementation.

pub mod dynamodb;

use api_scraper_source_models::{NormalizedRecord, RawRecord, TableConfig};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Largest number of requests the storage API accepts per call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Error reported by a [`BatchWriteBackend`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// One entry of a batched write call.
///
/// Serializes to the storage API's shape:
/// `{"DeleteRequest": {"Key": {...}}}` or `{"PutRequest": {"Item": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WriteRequest {
    /// Removes the item with this key.
    #[serde(rename = "DeleteRequest")]
    Delete {
        /// Hash key attribute and value.
        #[serde(rename = "Key")]
        key: RawRecord,
    },
    /// Stores this item, replacing any item with the same key.
    #[serde(rename = "PutRequest")]
    Put {
        /// The full item.
        #[serde(rename = "Item")]
        item: RawRecord,
    },
}

/// Which half of a batch a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum WritePhase {
    /// The delete call.
    Delete,
    /// The put call.
    Put,
}

/// Errors that can occur while writing records.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// A record lacks the table's hash key, so it cannot be deleted.
    #[error("batch {batch_index}: record {record_index} has no hash key '{hash_key}'")]
    MissingHashKey {
        /// Zero-based batch index.
        batch_index: usize,
        /// Position of the record within the batch.
        record_index: usize,
        /// Hash key attribute name.
        hash_key: String,
    },

    /// A batched write call failed.
    #[error("batch {batch_index}: {phase} write to table '{table}' failed: {source}")]
    Backend {
        /// Zero-based batch index.
        batch_index: usize,
        /// Table written to.
        table: String,
        /// Delete or put.
        phase: WritePhase,
        /// Underlying backend error.
        source: BackendError,
    },
}

/// A storage API accepting one batched write call at a time.
///
/// Each call succeeds or fails as a whole; partial success is reported as
/// a failure.
pub trait BatchWriteBackend: Send + Sync {
    /// Applies `requests` to `table` in one call.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the call fails or leaves any request
    /// unprocessed.
    fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;
}

/// Totals for one [`BatchWriter::write_all`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    /// Batches written (each one delete call and one put call).
    pub batches: usize,
    /// Records written.
    pub records: usize,
}

impl std::fmt::Display for WriteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} records in {} batches", self.records, self.batches)
    }
}

/// Splits `records` into consecutive batches of at most `batch_size`.
///
/// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
pub fn batches(
    records: &[NormalizedRecord],
    batch_size: usize,
) -> impl Iterator<Item = &[NormalizedRecord]> {
    records.chunks(batch_size.clamp(1, MAX_BATCH_SIZE))
}

/// Builds one delete request per record, keyed by `hash_key`.
///
/// # Errors
///
/// Returns [`WriteError::MissingHashKey`] if a record lacks the hash key.
pub fn delete_requests(
    batch: &[NormalizedRecord],
    hash_key: &str,
    batch_index: usize,
) -> Result<Vec<WriteRequest>, WriteError> {
    batch
        .iter()
        .enumerate()
        .map(|(record_index, record)| {
            let value = record
                .get(hash_key)
                .ok_or_else(|| WriteError::MissingHashKey {
                    batch_index,
                    record_index,
                    hash_key: hash_key.to_owned(),
                })?;
            let mut key = RawRecord::new();
            key.insert(hash_key.to_owned(), value.clone());
            Ok(WriteRequest::Delete { key })
        })
        .collect()
}

/// Builds one put request per record carrying the full record.
#[must_use]
pub fn put_requests(batch: &[NormalizedRecord]) -> Vec<WriteRequest> {
    batch
        .iter()
        .map(|record| WriteRequest::Put {
            item: record.as_map().clone(),
        })
        .collect()
}

/// Writes pages of records to a table through a [`BatchWriteBackend`].
#[derive(Debug)]
pub struct BatchWriter<B> {
    backend: B,
    batch_size: usize,
}

impl<B: BatchWriteBackend> BatchWriter<B> {
    /// Creates a writer using the largest batch size the storage API
    /// accepts.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Sets the batch size, clamped to `1..=MAX_BATCH_SIZE`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Borrows the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Writes every record, one batch at a time: a delete call for the
    /// batch's keys, then a put call for its items.
    ///
    /// Zero records means zero calls. The first failing call stops the
    /// write; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] naming the failing batch.
    pub async fn write_all(
        &self,
        table_config: &TableConfig,
        records: &[NormalizedRecord],
    ) -> Result<WriteStats, WriteError> {
        let table = table_config.table.as_str();
        let mut stats = WriteStats::default();

        log::info!(
            "Writing {} records to '{table}' in batches of {}",
            records.len(),
            self.batch_size
        );

        for (batch_index, batch) in batches(records, self.batch_size).enumerate() {
            log::debug!("Batch {}: {} records", batch_index + 1, batch.len());

            let deletes = delete_requests(batch, &table_config.hash_key, batch_index)?;
            self.backend
                .batch_write(table, deletes)
                .await
                .map_err(|source| WriteError::Backend {
                    batch_index,
                    table: table.to_owned(),
                    phase: WritePhase::Delete,
                    source,
                })?;

            self.backend
                .batch_write(table, put_requests(batch))
                .await
                .map_err(|source| WriteError::Backend {
                    batch_index,
                    table: table.to_owned(),
                    phase: WritePhase::Put,
                    source,
                })?;

            stats.batches += 1;
            stats.records += batch.len();
        }

        log::info!("Wrote {stats} to '{table}'");
        Ok(stats)
    }
}
