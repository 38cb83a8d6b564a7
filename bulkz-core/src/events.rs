//! Caller-supplied sink for structured engine events.
//!
//! Every component receives its sink at construction. [`TracingSink`] turns
//! events into `tracing` records; front ends wrap it to drive progress output.

use std::path::Path;

use crate::batch::report::BatchReport;
use crate::compress::CompressionResult;

pub trait EventSink: Send + Sync {
    /// Discovery could not inspect an entry and skipped it.
    fn entry_skipped(&self, _path: &Path, _reason: &str) {}
    /// An explicit input was dropped before the batch started.
    fn input_rejected(&self, _path: &Path, _reason: &str) {}
    fn batch_started(&self, _files: usize, _bytes: u64, _workers: usize) {}
    /// Called from worker threads.
    fn file_started(&self, _path: &Path, _size: u64) {}
    fn file_finished(&self, _result: &CompressionResult, _done: usize, _total: usize) {}
    fn original_deleted(&self, _path: &Path) {}
    fn batch_finished(&self, _report: &BatchReport) {}
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {}

/// Default sink: one `tracing` event per engine event.
#[derive(Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn entry_skipped(&self, path: &Path, reason: &str) {
        tracing::warn!(path = %path.display(), reason, "cannot access entry, skipping");
    }

    fn input_rejected(&self, path: &Path, reason: &str) {
        tracing::warn!(path = %path.display(), reason, "input dropped");
    }

    fn batch_started(&self, files: usize, bytes: u64, workers: usize) {
        tracing::info!(files, bytes, workers, "batch started");
    }

    fn file_started(&self, path: &Path, size: u64) {
        tracing::debug!(path = %path.display(), size, "compressing");
    }

    fn file_finished(&self, result: &CompressionResult, done: usize, total: usize) {
        match result.error_message() {
            None => tracing::info!(
                path = %result.input_path.display(),
                original = result.original_size,
                compressed = result.compressed_size(),
                ratio = result.compression_ratio(),
                secs = result.elapsed.as_secs_f64(),
                done,
                total,
                "compressed"
            ),
            Some(error) => tracing::error!(
                path = %result.input_path.display(),
                error = %error,
                done,
                total,
                "compression failed"
            ),
        }
    }

    fn original_deleted(&self, path: &Path) {
        tracing::info!(path = %path.display(), "deleted original");
    }

    fn batch_finished(&self, report: &BatchReport) {
        let s = &report.summary;
        tracing::info!(
            files = s.total_files,
            successful = s.successful,
            failed = s.failed,
            saved = s.space_saved_bytes,
            secs = s.total_time_seconds,
            engine = %report.compression_engine,
            "batch finished"
        );
    }
}
