use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tourload_core::{ErrorCategory, LoadObserver, LoadStats, MemoryStore};

pub mod load;
pub mod scale;
pub mod verify;

/// Drives one progress bar across the table loads of a seeding run
pub struct ProgressObserver {
    pb: ProgressBar,
}

impl ProgressObserver {
    pub fn new(quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            create_progress_bar(0)
        };
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl LoadObserver for ProgressObserver {
    fn on_load_start(&self, table: &str, call_count: u64) {
        self.pb.reset();
        self.pb.set_length(call_count);
        self.pb.set_prefix(table.to_string());
        self.pb.set_message("");
    }

    fn on_batch_flushed(&self, _table: &str, calls_done: u64, rows_inserted: u64) {
        self.pb.set_position(calls_done);
        self.pb.set_message(format!("{} rows", rows_inserted));
    }

    fn on_load_finish(&self, table: &str, stats: &LoadStats) {
        self.pb.set_position(stats.calls);
        self.pb.println(format!(
            "{:>14} {:>10} rows in {} batches",
            table, stats.rows_inserted, stats.batches
        ));
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{prefix:>14} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .map(|style| style.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Open a snapshot written by `load` or `run --snapshot`
pub async fn open_snapshot(path: &Path) -> Result<Arc<MemoryStore>> {
    let store = MemoryStore::open_snapshot(path)
        .await
        .with_context(|| format!("Failed to open snapshot: {}", path.display()))?;
    Ok(Arc::new(store))
}

pub async fn save_snapshot(store: &MemoryStore, path: &Path) -> Result<()> {
    store
        .save_snapshot(path)
        .await
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))
}

/// Category of the first crate error in `err`'s chain and whether it aborted
/// the run. `None` for errors raised by the CLI itself.
pub fn classify_failure(err: &anyhow::Error) -> Option<(ErrorCategory, bool)> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<tourload_core::Error>())
        .map(|core| (core.category(), core.is_fatal()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_classify_wrapped_core_error() {
        let err: Result<()> = Err(tourload_core::Error::bulk_load(
            "users",
            10,
            9,
            "Duplicate primary key `userId`: user01",
        ))
        .with_context(|| "Bulk load failed");
        let err = err.unwrap_err();

        assert_eq!(classify_failure(&err), Some((ErrorCategory::Load, true)));
    }

    #[test]
    fn test_classify_verification_failure_is_not_fatal() {
        let err = anyhow::Error::from(tourload_core::Error::Verification {
            failed: 2,
            total: 38,
        });
        assert_eq!(
            classify_failure(&err),
            Some((ErrorCategory::Verification, false))
        );
    }

    #[test]
    fn test_classify_cli_error() {
        assert_eq!(classify_failure(&anyhow!("Unsupported config file format")), None);
    }
}
