use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bulkz_core::{BatchReport, CompressionResult, EventSink, TracingSink};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

/// Drives a progress bar from engine events and forwards every event to
/// [`TracingSink`], with the bar suspended so log lines don't tear it.
pub struct ProgressSink {
    bar: ProgressBar,
    bytes_done: AtomicU64,
    bytes_total: AtomicU64,
    inner: TracingSink,
}

impl ProgressSink {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{prefix:.bold} [{elapsed_precise}] {bar:30} {pos}/{len} files {wide_msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_prefix("bulkz");
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            bytes_done: AtomicU64::new(0),
            bytes_total: AtomicU64::new(0),
            inner: TracingSink,
        }
    }

    /// Clear the bar early, e.g. when the run is interrupted.
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn update_message(&self) {
        let done = self.bytes_done.load(Ordering::Relaxed);
        let total = self.bytes_total.load(Ordering::Relaxed);
        self.bar
            .set_message(format!("{} / {}", HumanBytes(done), HumanBytes(total)));
    }
}

impl EventSink for ProgressSink {
    fn entry_skipped(&self, path: &Path, reason: &str) {
        self.bar.suspend(|| self.inner.entry_skipped(path, reason));
    }

    fn input_rejected(&self, path: &Path, reason: &str) {
        self.bar.suspend(|| self.inner.input_rejected(path, reason));
    }

    fn batch_started(&self, files: usize, bytes: u64, workers: usize) {
        self.bytes_total.store(bytes, Ordering::Relaxed);
        self.bar.set_length(files as u64);
        self.bar.set_position(0);
        self.update_message();
        self.bar.enable_steady_tick(Duration::from_millis(200));
        self.bar
            .suspend(|| self.inner.batch_started(files, bytes, workers));
    }

    fn file_started(&self, path: &Path, size: u64) {
        self.inner.file_started(path, size);
    }

    fn file_finished(&self, result: &CompressionResult, done: usize, total: usize) {
        self.bytes_done
            .fetch_add(result.original_size, Ordering::Relaxed);
        self.bar.set_position(done as u64);
        self.update_message();
        self.bar
            .suspend(|| self.inner.file_finished(result, done, total));
    }

    fn original_deleted(&self, path: &Path) {
        self.bar.suspend(|| self.inner.original_deleted(path));
    }

    fn batch_finished(&self, report: &BatchReport) {
        self.finish();
        self.inner.batch_finished(report);
    }
}
