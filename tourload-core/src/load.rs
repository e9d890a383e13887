//! Batched bulk loading
//!
//! [`BulkLoader`] drives a row producer for a fixed number of calls, buffers
//! what it yields and flushes full batches to the [`Store`] strictly in
//! generation order. A flush that stores fewer rows than it submitted is a
//! primary key collision: it stops the load with [`Error::BulkLoad`] unless
//! the loader is configured to tolerate duplicates.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LoadConfig;
use crate::storage::Store;
use crate::types::Row;
use crate::{Error, Result};

/// What a row producer yields for one call
#[derive(Debug, Clone, PartialEq)]
pub enum RowYield {
    /// Nothing for this call
    Skip,
    One(Row),
    Many(Vec<Row>),
    /// Stop calling the producer; rows already buffered are still flushed
    Abort,
}

impl From<Row> for RowYield {
    fn from(row: Row) -> Self {
        RowYield::One(row)
    }
}

impl From<Option<Row>> for RowYield {
    fn from(row: Option<Row>) -> Self {
        row.map_or(RowYield::Skip, RowYield::One)
    }
}

/// Progress hook for bulk loads
pub trait LoadObserver: Send + Sync {
    fn on_load_start(&self, _table: &str, _call_count: u64) {}

    /// Called after every flush with the calls made so far
    fn on_batch_flushed(&self, _table: &str, _calls_done: u64, _rows_inserted: u64) {}

    fn on_load_finish(&self, _table: &str, _stats: &LoadStats) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

/// Statistics of one load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Target table
    pub table: String,

    /// Producer calls made
    pub calls: u64,

    /// Calls that yielded nothing
    pub skipped_calls: u64,

    /// Rows handed to the store
    pub rows_submitted: u64,

    /// Rows the store accepted
    pub rows_inserted: u64,

    /// Flushes performed
    pub batches: u64,

    /// Rows rejected by a tolerated flush
    pub duplicates_tolerated: u64,

    /// The producer stopped the load early
    pub aborted: bool,

    /// Time spent inside the store
    pub write_time: Duration,

    /// Inserted rows per second of write time
    pub throughput: f64,
}

impl LoadStats {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    fn record_flush(&mut self, submitted: u64, inserted: u64, elapsed: Duration) {
        self.rows_submitted += submitted;
        self.rows_inserted += inserted;
        self.batches += 1;
        self.write_time += elapsed;
        if self.write_time.as_secs_f64() > 0.0 {
            self.throughput = self.rows_inserted as f64 / self.write_time.as_secs_f64();
        }
    }
}

/// Bulk loader over a shared store handle
pub struct BulkLoader {
    store: Arc<dyn Store>,
    config: LoadConfig,
    observer: Arc<dyn LoadObserver>,
    last_stats: Option<LoadStats>,
}

impl fmt::Debug for BulkLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkLoader")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("last_stats", &self.last_stats)
            .finish_non_exhaustive()
    }
}

impl BulkLoader {
    pub fn new(store: Arc<dyn Store>, config: LoadConfig) -> Self {
        Self {
            store,
            config,
            observer: Arc::new(NoopObserver),
            last_stats: None,
        }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Statistics of the most recent load
    pub fn last_stats(&self) -> Option<&LoadStats> {
        self.last_stats.as_ref()
    }

    /// Call `producer` `call_count` times and insert everything it yields.
    ///
    /// The producer receives the number of rows yielded so far and the call
    /// ordinal. Returns the number of rows the store accepted.
    pub async fn load<F>(&mut self, table: &str, call_count: u64, mut producer: F) -> Result<u64>
    where
        F: FnMut(u64, u64) -> Result<RowYield>,
    {
        debug!(table, call_count, batch_rows = self.config.batch_rows, "bulk load start");
        self.observer.on_load_start(table, call_count);

        let batch_rows = self.config.batch_rows.max(1);
        let mut stats = LoadStats::new(table);
        let mut batch: Vec<Row> = Vec::with_capacity(batch_rows);
        let mut row_ordinal = 0_u64;

        for call in 0..call_count {
            let rows = match producer(row_ordinal, call)? {
                RowYield::Skip => {
                    stats.skipped_calls += 1;
                    stats.calls += 1;
                    continue;
                }
                RowYield::Abort => {
                    debug!(table, call, "producer aborted the load");
                    stats.aborted = true;
                    break;
                }
                RowYield::One(row) => vec![row],
                RowYield::Many(rows) => rows,
            };
            stats.calls += 1;

            for row in rows {
                batch.push(row);
                row_ordinal += 1;
                if batch.len() == batch_rows {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_rows));
                    self.flush(table, full, &mut stats).await?;
                    self.observer
                        .on_batch_flushed(table, stats.calls, stats.rows_inserted);
                }
            }
        }

        if !batch.is_empty() {
            self.flush(table, batch, &mut stats).await?;
            self.observer
                .on_batch_flushed(table, stats.calls, stats.rows_inserted);
        }

        info!(
            table,
            rows = stats.rows_inserted,
            batches = stats.batches,
            skipped = stats.skipped_calls,
            "bulk load done"
        );
        self.observer.on_load_finish(table, &stats);
        let inserted = stats.rows_inserted;
        self.last_stats = Some(stats);
        Ok(inserted)
    }

    /// Insert a list of rows in batches, with the same failure policy as
    /// [`BulkLoader::load`]
    pub async fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<u64> {
        let mut rows = rows.into_iter();
        let count = rows.len() as u64;
        self.load(table, count, |_, _| Ok(rows.next().into())).await
    }

    async fn flush(&self, table: &str, rows: Vec<Row>, stats: &mut LoadStats) -> Result<()> {
        let submitted = rows.len() as u64;
        debug!(table, rows = submitted, "flush batch");

        let start = Instant::now();
        let outcome = self.store.insert_batch(table, rows).await?;
        stats.record_flush(submitted, outcome.inserted, start.elapsed());

        if outcome.inserted < submitted {
            let first_error = outcome
                .first_error
                .unwrap_or_else(|| "store reported no error message".to_string());
            if self.config.fail_on_duplicate_key {
                return Err(Error::bulk_load(
                    table,
                    submitted,
                    outcome.inserted,
                    first_error,
                ));
            }
            let rejected = submitted - outcome.inserted;
            stats.duplicates_tolerated += rejected;
            warn!(table, rejected, first_error = %first_error, "continuing after rejected rows");
        }
        Ok(())
    }
}

/// Builder for configuring a bulk loader
pub struct BulkLoaderBuilder {
    config: LoadConfig,
    batch_rows: Option<usize>,
    fail_on_duplicate_key: Option<bool>,
    observer: Option<Arc<dyn LoadObserver>>,
}

impl BulkLoaderBuilder {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            batch_rows: None,
            fail_on_duplicate_key: None,
            observer: None,
        }
    }

    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = Some(rows);
        self
    }

    pub fn with_fail_on_duplicate_key(mut self, fail: bool) -> Self {
        self.fail_on_duplicate_key = Some(fail);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self, store: Arc<dyn Store>) -> BulkLoader {
        let mut config = self.config;
        if let Some(rows) = self.batch_rows {
            config.batch_rows = rows;
        }
        if let Some(fail) = self.fail_on_duplicate_key {
            config.fail_on_duplicate_key = fail;
        }

        let mut loader = BulkLoader::new(store, config);
        if let Some(observer) = self.observer {
            loader.observer = observer;
        }
        loader
    }
}
